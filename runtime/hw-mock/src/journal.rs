//! Shared access journal

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// One register access as seen by a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub device: &'static str,
    pub kind: AccessKind,
    pub offset: usize,
    pub width: u8,
    pub value: u32,
}

/// Ordered record of register accesses, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<Access>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, access: Access) {
        self.entries.borrow_mut().push(access);
    }

    pub fn entries(&self) -> Vec<Access> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Values written to `offset` on `device`, in order
    pub fn writes_to(&self, device: &str, offset: usize) -> Vec<u32> {
        self.entries
            .borrow()
            .iter()
            .filter(|a| a.device == device && a.kind == AccessKind::Write && a.offset == offset)
            .map(|a| a.value)
            .collect()
    }

    /// Number of reads of `offset` on `device`
    pub fn reads_of(&self, device: &str, offset: usize) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|a| a.device == device && a.kind == AccessKind::Read && a.offset == offset)
            .count()
    }

    /// Index of the first access matching `kind` at `offset` on `device`
    pub fn position(&self, device: &str, kind: AccessKind, offset: usize) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|a| a.device == device && a.kind == kind && a.offset == offset)
    }

    /// Number of writes of any register on `device`
    pub fn write_count(&self, device: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|a| a.device == device && a.kind == AccessKind::Write)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_is_shared_between_clones() {
        let journal = Journal::new();
        let other = journal.clone();
        other.record(Access {
            device: "uart",
            kind: AccessKind::Write,
            offset: 0x44,
            width: 4,
            value: 0x10,
        });
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.writes_to("uart", 0x44), vec![0x10]);
        assert_eq!(journal.reads_of("uart", 0x44), 0);
        assert_eq!(journal.position("uart", AccessKind::Write, 0x44), Some(0));
        journal.clear();
        assert!(other.is_empty());
    }
}
