//! Testing utilities for vetshim workspace
//!
//! Shared transpiler doubles, sample sources, and fault fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vetshim_transform::{
    BuildPipeline, TranspileFailure, TranspileMessage, TranspileOutput, TranspileRequest,
    Transpiler,
};

pub use vetshim_bridge::ManualClock;

/// Clean dashboard app using core, charts and icons
pub const DASHBOARD_SOURCE: &str = r"'use client';
import React, { useState, useMemo } from 'react';
import { LineChart, Line, XAxis, YAxis, Tooltip, ResponsiveContainer } from 'recharts';
import { Plus, Trash2 } from 'lucide-react';
import { format } from 'date-fns';

export default function Dashboard() {
  const [points, setPoints] = useState([]);
  const total = useMemo(() => points.reduce((sum, p) => sum + p.value, 0), [points]);

  const add = () => setPoints([...points, { day: format(new Date(), 'MMM d'), value: 1 }]);

  return (
    <div className='p-4'>
      <button onClick={add}><Plus size={16} /> Add</button>
      <button onClick={() => setPoints([])}><Trash2 size={16} /></button>
      <p>Total: {total}</p>
      <ResponsiveContainer width='100%' height={240}>
        <LineChart data={points}>
          <XAxis dataKey='day' />
          <YAxis />
          <Tooltip />
          <Line dataKey='value' />
        </LineChart>
      </ResponsiveContainer>
    </div>
  );
}
";

/// App that reaches for persistent storage and a blocked package
pub const BLOCKED_SOURCE: &str = r"import axios from 'axios';

export default function App() {
  localStorage.setItem('k', 'v');
  return null;
}
";

/// App that only trips advisory findings
pub const ADVISORY_SOURCE: &str = r"import confetti from 'canvas-confetti';

export default function App() {
  fetch('/api/items');
  return null;
}
";

/// Transpiler that echoes its input and counts calls
#[derive(Debug, Default)]
pub struct CountingTranspiler {
    calls: AtomicUsize,
    last_request: Mutex<Option<TranspileRequest>>,
}

impl CountingTranspiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TranspileRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl Transpiler for CountingTranspiler {
    async fn transpile(
        &self,
        request: TranspileRequest,
    ) -> Result<TranspileOutput, TranspileFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let code = request.code.clone();
        *self.last_request.lock() = Some(request);
        Ok(TranspileOutput::new(code))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Transpiler that always fails with the given messages
#[derive(Debug, Clone)]
pub struct FailingTranspiler {
    messages: Vec<TranspileMessage>,
}

impl FailingTranspiler {
    pub fn new(messages: Vec<TranspileMessage>) -> Arc<Self> {
        Arc::new(Self { messages })
    }

    /// Single located syntax error
    pub fn syntax_error(line: u32, column: u32) -> Arc<Self> {
        Self::new(vec![
            TranspileMessage::new("Expected \";\" but found \"y\"").at(line, column)
        ])
    }
}

#[async_trait]
impl Transpiler for FailingTranspiler {
    async fn transpile(
        &self,
        _request: TranspileRequest,
    ) -> Result<TranspileOutput, TranspileFailure> {
        Err(TranspileFailure {
            messages: self.messages.clone(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Transpiler that panics on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingTranspiler;

#[async_trait]
impl Transpiler for PanickingTranspiler {
    async fn transpile(
        &self,
        _request: TranspileRequest,
    ) -> Result<TranspileOutput, TranspileFailure> {
        panic!("transpiler exploded")
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

pub fn setup_pipeline(transpiler: Arc<dyn Transpiler>) -> BuildPipeline {
    BuildPipeline::new(transpiler)
}

/// Clock frozen at 2024-01-01T00:00:00Z
pub fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixed_time()))
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Fault protocol message as the in-sandbox reporter posts it
pub fn fault_message(kind: &str, app_id: &str, message: &str) -> Value {
    json!({ "type": kind, "data": { "message": message }, "appId": app_id })
}
