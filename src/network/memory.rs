//! In-memory provisioner for tests

use super::NetworkProvisioner;
use crate::error::{Error, Result};
use crate::naming::ChannelName;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Debug, Default)]
struct State {
    live: BTreeSet<ChannelName>,
    create_calls: Vec<ChannelName>,
    delete_calls: Vec<ChannelName>,
    failing_creates: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    /// Fail this many upcoming creates regardless of name
    fail_next_creates: usize,
}

/// Fake host network facility
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvisioner {
    state: Rc<RefCell<State>>,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create of `name` fail
    pub fn fail_create(&self, name: &str) {
        self.state.borrow_mut().failing_creates.insert(name.to_string());
    }

    /// Make every delete of `name` fail
    pub fn fail_delete(&self, name: &str) {
        self.state.borrow_mut().failing_deletes.insert(name.to_string());
    }

    /// Make the next `count` creates fail, whatever the channel name
    pub fn fail_next_creates(&self, count: usize) {
        self.state.borrow_mut().fail_next_creates = count;
    }

    /// Channels currently present on the fake host
    pub fn live(&self) -> BTreeSet<ChannelName> {
        self.state.borrow().live.clone()
    }

    pub fn create_calls(&self) -> Vec<ChannelName> {
        self.state.borrow().create_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<ChannelName> {
        self.state.borrow().delete_calls.clone()
    }
}

impl NetworkProvisioner for MemoryProvisioner {
    fn create(&self, channel: &ChannelName) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.create_calls.push(channel.clone());

        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(Error::Provisioning {
                channel: channel.to_string(),
                message: "injected failure".to_string(),
            });
        }
        if state.failing_creates.contains(channel.as_str()) || state.live.contains(channel) {
            return Err(Error::Provisioning {
                channel: channel.to_string(),
                message: "RTNETLINK answers: File exists".to_string(),
            });
        }

        state.live.insert(channel.clone());
        Ok(())
    }

    fn delete(&self, channel: &ChannelName) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.delete_calls.push(channel.clone());

        if state.failing_deletes.contains(channel.as_str()) || !state.live.remove(channel) {
            return Err(Error::Provisioning {
                channel: channel.to_string(),
                message: "Cannot find device".to_string(),
            });
        }
        Ok(())
    }
}
