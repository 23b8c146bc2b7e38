//! Payload assembly
//!
//! A payload is one classic script the sandbox evaluates as is:
//!
//! ```text
//! // @vetshim app=<id> bundles=<names>
//! // @built-at <timestamp>
//! (function () {
//!   <fault reporter>
//!   <runtime helper>
//!   <core bindings>
//!   <shim prelude>
//!   <transpiled code>
//!   <mount step>
//! })();
//! ```
//!
//! Everything except the `@built-at` line is a pure function of the input,
//! which is what [`fingerprint`] relies on.

use crate::rewrite::js_string;
use crate::shim::DEPS_GLOBAL;
use chrono::{DateTime, SecondsFormat, Utc};
use vetshim_bridge::{reporter_script, REPORT_FUNCTION};

/// Header line carrying the build time
pub const TIMESTAMP_MARKER: &str = "// @built-at";

/// Header line carrying app id and bundles
pub const HEADER_MARKER: &str = "// @vetshim";

const RUNTIME_HELPER: &str = r#"var __vs = (function (deps) {
  var inert = {
    component: function () { return null; },
    fn: function () {},
    hook: function () { return {}; },
    object: {}
  };
  function bundle(name) {
    var entry = deps[name];
    if (!entry) {
      console.warn('[vetshim] runtime bundle "' + name + '" is not loaded');
      return {};
    }
    return entry;
  }
  function module(name, pkg) {
    var entry = bundle(name);
    var modules = entry.__modules;
    return modules && modules[pkg] !== undefined ? modules[pkg] : entry;
  }
  function defaultOf(name, pkg) {
    var m = module(name, pkg);
    return m && m['default'] !== undefined ? m['default'] : m;
  }
  return { bundle: bundle, module: module, defaultOf: defaultOf, inert: inert };
})(globalThis.__DEPS_GLOBAL__ || {});"#;

const MOUNT_STEP: &str = r#"(function () {
  var core = __vs.bundle("core");
  var container = document.getElementById(__ROOT_ID__);
  if (!container) {
    container = document.createElement('div');
    container.id = __ROOT_ID__;
    document.body.appendChild(container);
  }
  try {
    if (typeof __ENTRY__ === 'undefined') {
      throw new Error(__NOT_FOUND__);
    }
    var element = core.React.createElement(__ENTRY__);
    if (core.ReactDOM && typeof core.ReactDOM.createRoot === 'function') {
      core.ReactDOM.createRoot(container).render(element);
    } else {
      core.ReactDOM.render(element, container);
    }
  } catch (error) {
    var message = error && error.message ? String(error.message) : String(error);
    if (typeof window.__REPORT_FN__ === 'function') {
      window.__REPORT_FN__('runtime_error', {
        message: 'Mount failed: ' + message,
        stack: error && error.stack ? String(error.stack) : undefined
      });
    }
    container.textContent = '';
    var panel = document.createElement('div');
    panel.setAttribute('role', 'alert');
    panel.style.cssText = 'margin:16px;padding:16px;border:1px solid #f5c2c7;border-radius:8px;background:#fff5f5;color:#842029;font-family:system-ui,sans-serif;';
    var title = document.createElement('strong');
    title.textContent = 'This app could not start';
    var detail = document.createElement('pre');
    detail.style.cssText = 'margin:8px 0 0;white-space:pre-wrap;font-size:12px;';
    detail.textContent = message;
    panel.appendChild(title);
    panel.appendChild(detail);
    container.appendChild(panel);
  }
})();"#;

/// Pieces of one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadParts<'a> {
    /// Owning app
    pub app_id: &'a str,
    /// Required bundle names, in load order
    pub bundles: &'a [String],
    /// Build time for the header
    pub built_at: DateTime<Utc>,
    /// Core destructuring statement
    pub core_block: &'a str,
    /// Non-core bindings
    pub prelude: &'a str,
    /// Transpiled application code
    pub code: &'a str,
    /// Component the mount step renders
    pub entry_component: &'a str,
    /// Id of the mount container
    pub root_element_id: &'a str,
}

/// Render the executable payload
#[must_use]
pub fn assemble(parts: &PayloadParts<'_>) -> String {
    let helper = RUNTIME_HELPER.replace("__DEPS_GLOBAL__", DEPS_GLOBAL);
    let mount = MOUNT_STEP
        .replace("__REPORT_FN__", REPORT_FUNCTION)
        .replace("__ROOT_ID__", &js_string(parts.root_element_id))
        .replace(
            "__NOT_FOUND__",
            &js_string(&format!("Component not found: {}", parts.entry_component)),
        )
        .replace("__ENTRY__", parts.entry_component);

    let mut out = String::with_capacity(
        parts.code.len() + parts.prelude.len() + helper.len() + mount.len() + 4096,
    );
    out.push_str(&format!(
        "{} app={} bundles={}\n",
        HEADER_MARKER,
        comment_safe(parts.app_id),
        parts.bundles.join(",")
    ));
    out.push_str(&format!(
        "{} {}\n",
        TIMESTAMP_MARKER,
        parts.built_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    let reporter = reporter_script(parts.app_id);
    out.push_str("(function () {\n");
    for section in [
        reporter.as_str(),
        helper.as_str(),
        parts.core_block,
        parts.prelude,
        parts.code.trim_end(),
        mount.as_str(),
    ] {
        if section.is_empty() {
            continue;
        }
        out.push_str(section);
        out.push('\n');
    }
    out.push_str("})();\n");
    out
}

/// Drop `// @built-at` lines
#[must_use]
pub fn strip_timestamp_lines(payload: &str) -> String {
    payload
        .split_inclusive('\n')
        .filter(|line| !line.starts_with(TIMESTAMP_MARKER))
        .collect()
}

/// blake3 digest of the payload without timestamp lines
#[must_use]
pub fn fingerprint(payload: &str) -> String {
    blake3::hash(strip_timestamp_lines(payload).as_bytes())
        .to_hex()
        .to_string()
}

/// Replace anything that would end a `//` comment
fn comment_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{2028}' | '\u{2029}' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
