//! Write-enable / issue / poll cycle

use crate::capability::PollPolicy;
use crate::error::Result;
use crate::protocol;
use crate::transport::Transport;

/// Where a program or erase cycle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    /// No operation in progress
    #[default]
    Idle,
    /// WREN sent, latch not seen yet
    WriteEnablePending,
    /// Latch read back as set
    WriteEnableConfirmed,
    /// Program, erase or register write sent
    CommandIssued,
    /// Waiting for WIP to clear
    Polling,
}

impl SequencerState {
    fn advance(&mut self, next: Self) {
        log::trace!("{:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Run one modifying command under the write-enable handshake
///
/// Sends WREN, confirms WEL with at most `wel_retries` status reads, lets
/// `issue` send the command and polls WIP per `poll`. When any step fails
/// a Write Disable is sent; its own failure is only logged and the
/// original error is returned. `state` is back at
/// [`SequencerState::Idle`] on return.
pub fn write_cycle<T, F>(
    transport: &mut T,
    state: &mut SequencerState,
    wel_retries: u8,
    poll: &PollPolicy,
    issue: F,
) -> Result<(), T::Error>
where
    T: Transport + ?Sized,
    F: FnOnce(&mut T) -> Result<(), T::Error>,
{
    let result = run_cycle(transport, state, wel_retries, poll, issue);
    if let Err(ref e) = result {
        log::debug!("cycle failed in {:?}: {:?}", state, e);
        if let Err(cleanup) = protocol::write_disable(transport) {
            log::warn!("WRDI after failed cycle: {:?}", cleanup);
        }
    }
    state.advance(SequencerState::Idle);
    result
}

fn run_cycle<T, F>(
    transport: &mut T,
    state: &mut SequencerState,
    wel_retries: u8,
    poll: &PollPolicy,
    issue: F,
) -> Result<(), T::Error>
where
    T: Transport + ?Sized,
    F: FnOnce(&mut T) -> Result<(), T::Error>,
{
    protocol::write_enable(transport)?;
    state.advance(SequencerState::WriteEnablePending);
    protocol::confirm_write_enable(transport, wel_retries)?;
    state.advance(SequencerState::WriteEnableConfirmed);
    issue(transport)?;
    state.advance(SequencerState::CommandIssued);
    state.advance(SequencerState::Polling);
    protocol::wait_ready(transport, poll)
}
