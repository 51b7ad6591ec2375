//! Scripted in-memory transport for exercising device setup without hardware.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::registers::{self, Register};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    connect_calls: usize,
    close_calls: usize,
    reads: Vec<Register>,
}

/// Observer for a [`MockTransport`] that stays valid after the transport
/// has been moved into a device.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers read so far, in order.
    pub fn reads(&self) -> Vec<Register> {
        self.state().reads.clone()
    }

    pub fn was_read(&self, register: Register) -> bool {
        self.state().reads.contains(&register)
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn connect_calls(&self) -> usize {
        self.state().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    pub fn was_closed(&self) -> bool {
        self.close_calls() > 0 && !self.is_connected()
    }
}

/// A transport answering from a fixed register map.
///
/// Registers without a scripted value answer with an illegal-address
/// exception, the way firmware reacts to registers it does not implement.
#[derive(Debug, Default)]
pub struct MockTransport {
    values: HashMap<Register, Option<u16>>,
    failing: HashSet<Register>,
    refuse_connect: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit reporting the given model code, bus version and firmware 2.1.4.
    pub fn controller(hardware_type: u16, bus_version: u16) -> Self {
        Self::new()
            .with_value(registers::CONTROL_TYPE, hardware_type)
            .with_value(registers::BUS_VERSION, bus_version)
            .with_value(registers::APP_VERSION_MAJOR, 2)
            .with_value(registers::APP_VERSION_MINOR, 1)
            .with_value(registers::APP_VERSION_RELEASE, 4)
    }

    pub fn with_value(mut self, register: Register, value: u16) -> Self {
        self.values.insert(register, Some(value));
        self
    }

    /// Answer without data for `register`.
    pub fn with_empty(mut self, register: Register) -> Self {
        self.values.insert(register, None);
        self
    }

    /// Fail reads of `register` with a transport error.
    pub fn with_failure(mut self, register: Register) -> Self {
        self.failing.insert(register);
        self
    }

    pub fn refusing_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.connect_calls += 1;
        if self.refuse_connect {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn read_register(&mut self, register: Register) -> Result<Option<u16>, TransportError> {
        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.reads.push(register);

        if self.failing.contains(&register) {
            return Err(TransportError::Read(format!("read of {} failed", register)));
        }

        match self.values.get(&register) {
            Some(value) => Ok(*value),
            None => Err(TransportError::Exception("IllegalDataAddress".to_string())),
        }
    }

    async fn close(&mut self) {
        let mut state = self.state();
        state.close_calls += 1;
        state.connected = false;
    }
}
