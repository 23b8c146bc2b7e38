//! In-sandbox reporter script
//!
//! The sandbox half of the fault protocol. Installed at the top of every
//! payload; posts `error_reporter_ready` once, then one message per
//! uncaught error, unhandled rejection or `console.error` call. Also
//! exposes `__vetshimReport(type, data)` for the mount step.

/// Global function the reporter installs for explicit reports
pub const REPORT_FUNCTION: &str = "__vetshimReport";

const TEMPLATE: &str = r#"(function () {
  var APP_ID = __APP_ID__;
  if (window.__vetshimReporterInstalled) return;
  window.__vetshimReporterInstalled = true;
  var target = window.parent && window.parent !== window ? window.parent : null;
  function post(type, data) {
    if (!target) return;
    try { target.postMessage({ type: type, data: data, appId: APP_ID }, '*'); } catch (_) {}
  }
  function describe(value) {
    if (value instanceof Error) {
      return { message: String(value.message || value), stack: value.stack ? String(value.stack) : undefined };
    }
    if (typeof value === 'string') return { message: value };
    try { return { message: String(JSON.stringify(value)) }; } catch (_) { return { message: String(value) }; }
  }
  window.addEventListener('error', function (event) {
    var info = describe(event.error || event.message);
    post('runtime_error', {
      message: info.message || String(event.message),
      source: event.filename || undefined,
      line: event.lineno || undefined,
      column: event.colno || undefined,
      stack: info.stack
    });
  });
  window.addEventListener('unhandledrejection', function (event) {
    var info = describe(event.reason);
    post('unhandled_rejection', { message: info.message, stack: info.stack });
  });
  var originalError = console.error;
  console.error = function () {
    var args = Array.prototype.slice.call(arguments);
    post('console_error', { message: args.map(function (a) { return describe(a).message; }).join(' ') });
    return originalError.apply(console, args);
  };
  window.__REPORT_FN__ = post;
  post('error_reporter_ready', { message: 'ready' });
})();"#;

/// Reporter script bound to `app_id`
///
/// The id is embedded as a JSON string literal, so any value is safe.
#[must_use]
pub fn reporter_script(app_id: &str) -> String {
    let literal = serde_json::Value::String(app_id.to_string()).to_string();
    TEMPLATE
        .replace("__REPORT_FN__", REPORT_FUNCTION)
        .replace("__APP_ID__", &literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_app_id_as_literal() {
        let script = reporter_script("tracker-1");
        assert!(script.contains(r#"var APP_ID = "tracker-1";"#));
        assert!(script.contains("window.__vetshimReport = post;"));
    }

    #[test]
    fn hostile_app_id_is_escaped() {
        let script = reporter_script("a\"; alert(1); \"");
        assert!(script.contains(r#"var APP_ID = "a\"; alert(1); \"";"#));
    }

    #[test]
    fn posts_every_kind() {
        let script = reporter_script("a");
        for kind in [
            "'runtime_error'",
            "'unhandled_rejection'",
            "'console_error'",
            "'error_reporter_ready'",
        ] {
            assert!(script.contains(kind), "{kind}");
        }
    }
}
