/*
    batch.rs - Atomic command groups

    A CommandBatch is executed by the backend without interleaving commands
    from other clients. Every queued command hands back a Slot, and the
    BatchReport is queried per slot instead of by position.
*/

use super::errors::{StoreError, StoreResult};

/// A single storage command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a primary record
    Set { key: String, value: Vec<u8> },
    /// Delete a primary record
    Unlink { key: String },
    /// Add a member to a set
    SetAdd { set: String, member: String },
    /// Remove a member from a set
    SetRemove { set: String, member: String },
}

/// Handle to a queued command's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(usize);

/// Result of one command inside an executed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command acknowledged without a count (e.g. SET)
    Acknowledged,
    /// Number of keys or members the command affected
    Affected(u64),
}

/// Ordered group of commands executed as one unit
#[derive(Debug, Clone, Default)]
pub struct CommandBatch {
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, command: Command) -> Slot {
        self.commands.push(command);
        Slot(self.commands.len() - 1)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> Slot {
        self.push(Command::Set { key: key.into(), value })
    }

    pub fn unlink(&mut self, key: impl Into<String>) -> Slot {
        self.push(Command::Unlink { key: key.into() })
    }

    pub fn set_add(&mut self, set: impl Into<String>, member: impl Into<String>) -> Slot {
        self.push(Command::SetAdd {
            set: set.into(),
            member: member.into(),
        })
    }

    pub fn set_remove(&mut self, set: impl Into<String>, member: impl Into<String>) -> Slot {
        self.push(Command::SetRemove {
            set: set.into(),
            member: member.into(),
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Per-command results of an executed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<CommandOutcome>,
}

impl BatchReport {
    /// Build a report; backends must return exactly one outcome per command
    pub fn new(batch: &CommandBatch, outcomes: Vec<CommandOutcome>) -> StoreResult<Self> {
        if outcomes.len() != batch.len() {
            return Err(StoreError::Transport(format!(
                "batch returned {} results for {} commands",
                outcomes.len(),
                batch.len()
            )));
        }
        Ok(Self { outcomes })
    }

    /// Outcome for `slot`; `None` if the slot belongs to a longer batch
    pub fn outcome(&self, slot: Slot) -> Option<CommandOutcome> {
        self.outcomes.get(slot.0).copied()
    }

    /// Count of keys or members affected; 0 for acknowledged-only commands
    pub fn affected(&self, slot: Slot) -> Option<u64> {
        self.outcome(slot).map(|outcome| match outcome {
            CommandOutcome::Affected(n) => n,
            CommandOutcome::Acknowledged => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_queue_order() {
        let mut batch = CommandBatch::new();
        let delete = batch.unlink("id-1");
        let index = batch.set_remove("store:svc", "id-1");

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.commands()[1],
            Command::SetRemove {
                set: "store:svc".to_string(),
                member: "id-1".to_string()
            }
        );

        let report = BatchReport::new(
            &batch,
            vec![CommandOutcome::Affected(0), CommandOutcome::Affected(1)],
        )
        .unwrap();
        assert_eq!(report.affected(delete), Some(0));
        assert_eq!(report.affected(index), Some(1));
    }

    #[test]
    fn test_slot_from_longer_batch() {
        let mut long = CommandBatch::new();
        long.set("id-1", vec![1]);
        let foreign = long.unlink("id-1");

        let mut short = CommandBatch::new();
        short.unlink("id-2");
        let report = BatchReport::new(&short, vec![CommandOutcome::Affected(1)]).unwrap();

        assert_eq!(report.outcome(foreign), None);
        assert_eq!(report.affected(foreign), None);
    }

    #[test]
    fn test_report_length_mismatch() {
        let mut batch = CommandBatch::new();
        batch.set("id-1", vec![1]);

        assert!(BatchReport::new(&batch, vec![]).is_err());
    }
}
