//! PDF cross-reference table implementation

use super::ObjectId;

/// One `offset generation n|f` line of a classic xref section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefValue {
    object_id: u32,
    offset: u64,
    generation_number: u16,
    used: bool,
    object: Option<ObjectId>,
}

impl XRefValue {
    pub fn new(object_id: u32, offset: u64, generation_number: u16, used: bool) -> Self {
        Self {
            object_id,
            offset,
            generation_number,
            used,
            object: None,
        }
    }

    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn generation_number(&self) -> u16 {
        self.generation_number
    }

    /// `n` entries are used, `f` entries are free
    pub fn used(&self) -> bool {
        self.used
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.object_id, self.generation_number)
    }

    /// Parsed object this entry resolved to, if any
    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub(crate) fn set_object(&mut self, object: Option<ObjectId>) {
        self.object = object;
    }
}

/// PDF cross-reference table, in file order.
///
/// Entries of every section seen during a parse are kept; for a given
/// object number the last one read wins.
#[derive(Debug, Default)]
pub struct XRefTable {
    entries: Vec<XRefValue>,
}

impl XRefTable {
    /// Create new xref table
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: XRefValue) {
        self.entries.push(entry);
    }

    /// Latest entry for an object number
    pub fn get(&self, object_id: u32) -> Option<&XRefValue> {
        self.entries.iter().rev().find(|e| e.object_id == object_id)
    }

    /// Drop every entry matching `id`
    pub fn remove(&mut self, id: ObjectId) {
        self.entries.retain(|e| e.id() != id);
    }

    /// Get xref table entries
    pub fn entries(&self) -> &[XRefValue] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [XRefValue] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_entry_wins() {
        let mut xref = XRefTable::new();
        xref.push(XRefValue::new(1, 17, 0, true));
        xref.push(XRefValue::new(2, 80, 0, true));
        xref.push(XRefValue::new(1, 500, 0, true));

        assert_eq!(xref.len(), 3);
        assert_eq!(xref.get(1).map(XRefValue::offset), Some(500));
        assert_eq!(xref.get(2).map(XRefValue::offset), Some(80));
        assert!(xref.get(3).is_none());
    }

    #[test]
    fn test_remove() {
        let mut xref = XRefTable::new();
        xref.push(XRefValue::new(0, 0, 65535, false));
        xref.push(XRefValue::new(1, 17, 0, true));

        xref.remove(ObjectId::new(1, 0));
        assert_eq!(xref.len(), 1);
        assert!(!xref.entries()[0].used());
        assert_eq!(xref.entries()[0].generation_number(), 65535);
    }
}
