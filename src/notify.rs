/// Property-change notifications collected by an effect until the host drains them.
///
/// Each property is reported at most once per drain, in the order it first changed.
#[derive(Debug, Clone)]
pub struct ChangeLog<P> {
    pending: Vec<P>,
}

impl<P> Default for ChangeLog<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<P: Copy + PartialEq> ChangeLog<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `property` changed.
    pub fn mark(&mut self, property: P) {
        if !self.pending.contains(&property) {
            self.pending.push(property);
        }
    }

    /// Takes every pending notification, leaving the log empty.
    pub fn take(&mut self) -> Vec<P> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_changes_are_reported_once_in_order() {
        let mut log = ChangeLog::new();
        log.mark('b');
        log.mark('a');
        log.mark('b');
        assert_eq!(log.take(), vec!['b', 'a']);
        assert!(log.take().is_empty());
    }
}
