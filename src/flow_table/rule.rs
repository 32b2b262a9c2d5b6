use smallvec::SmallVec;

/// Inline byte capacity for match/action payloads. The wire format pads
/// these to 20 bytes (see `usdn::wire`); in memory we only need to carry
/// what `len` actually uses, but `SmallVec` keeps small payloads off the
/// heap without committing to the wire's padded size.
pub type RuleBytes = SmallVec<[u8; 20]>;

/// Comparison operator for a match rule. Numeric values mirror the
/// original enum ordering (`LT_EQ=-2 .. NOT_EQ=3`) so wire decoding can
/// round-trip the raw `i8` without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Operator {
    LtEq = -2,
    Lt = -1,
    Eq = 0,
    Gt = 1,
    GtEq = 2,
    NotEq = 3,
}

impl Operator {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            -2 => Some(Operator::LtEq),
            -1 => Some(Operator::Lt),
            0 => Some(Operator::Eq),
            1 => Some(Operator::Gt),
            2 => Some(Operator::GtEq),
            3 => Some(Operator::NotEq),
            _ => None,
        }
    }

    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Maps a `memcmp`-style ordering to whether this operator is
    /// satisfied, exactly as the original `sdn_ft_do_match` switch does.
    fn satisfied_by(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match (self, ordering) {
            (Operator::Eq, Equal) => true,
            (Operator::NotEq, Equal) => false,
            (Operator::NotEq, _) => true,
            (Operator::Lt, Less) => true,
            (Operator::LtEq, Less) | (Operator::LtEq, Equal) => true,
            (Operator::Gt, Greater) => true,
            (Operator::GtEq, Greater) | (Operator::GtEq, Equal) => true,
            _ => false,
        }
    }
}

/// Action kind. Numeric values mirror the original declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionKind {
    Accept = 0,
    Drop = 1,
    Query = 2,
    Forward = 3,
    Modify = 4,
    Fallback = 5,
    Srh = 6,
    Callback = 7,
}

impl ActionKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ActionKind::Accept),
            1 => Some(ActionKind::Drop),
            2 => Some(ActionKind::Query),
            3 => Some(ActionKind::Forward),
            4 => Some(ActionKind::Modify),
            5 => Some(ActionKind::Fallback),
            6 => Some(ActionKind::Srh),
            7 => Some(ActionKind::Callback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub operator: Operator,
    pub index: u8,
    pub len: u8,
    pub needs_ext: bool,
    pub data: RuleBytes,
}

impl MatchRule {
    pub fn new(operator: Operator, index: u8, needs_ext: bool, bytes: &[u8]) -> Self {
        MatchRule {
            operator,
            index,
            len: bytes.len() as u8,
            needs_ext,
            data: RuleBytes::from_slice(bytes),
        }
    }

    /// `offset = index + (needs_ext ? ext_len : 0)`; rejects (no-match)
    /// if the window doesn't fit, else maps the lexicographic comparison
    /// of `buf[offset..offset+len]` against `data` through `operator`.
    pub fn matches(&self, buf: &[u8], ext_len: usize) -> bool {
        let offset = self.index as usize + if self.needs_ext { ext_len } else { 0 };
        let len = self.len as usize;
        let Some(end) = offset.checked_add(len) else {
            return false;
        };
        if end > buf.len() {
            return false;
        }
        let window = &buf[offset..end];
        let ordering = window.cmp(&self.data[..len]);
        self.operator.satisfied_by(ordering)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRule {
    pub kind: ActionKind,
    pub index: u8,
    pub len: u8,
    pub data: RuleBytes,
}

impl ActionRule {
    pub fn new(kind: ActionKind, index: u8, bytes: &[u8]) -> Self {
        ActionRule {
            kind,
            index,
            len: bytes.len() as u8,
            data: RuleBytes::from_slice(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_matches_exact_window() {
        let rule = MatchRule::new(Operator::Eq, 2, false, &[0xAA, 0xBB]);
        let buf = [0u8, 0, 0xAA, 0xBB, 0xFF];
        assert!(rule.matches(&buf, 0));
    }

    #[test]
    fn eq_fails_on_mismatch() {
        let rule = MatchRule::new(Operator::Eq, 2, false, &[0xAA, 0xBB]);
        let buf = [0u8, 0, 0xAA, 0xCC, 0xFF];
        assert!(!rule.matches(&buf, 0));
    }

    #[test]
    fn not_eq_is_inverse_of_eq() {
        let rule = MatchRule::new(Operator::NotEq, 0, false, &[1, 2]);
        assert!(rule.matches(&[9, 9], 0));
        assert!(!rule.matches(&[1, 2], 0));
    }

    #[test]
    fn needs_ext_shifts_offset_by_ext_len() {
        let rule = MatchRule::new(Operator::Eq, 0, true, &[7]);
        let buf = [0u8, 0, 7];
        assert!(rule.matches(&buf, 2));
        assert!(!rule.matches(&buf, 0));
    }

    #[test]
    fn out_of_bounds_window_is_no_match() {
        let rule = MatchRule::new(Operator::Eq, 10, false, &[1, 2]);
        assert!(!rule.matches(&[1, 2, 3], 0));
    }

    #[test]
    fn ordering_operators() {
        let lt = MatchRule::new(Operator::Lt, 0, false, &[5]);
        assert!(lt.matches(&[3], 0));
        assert!(!lt.matches(&[5], 0));
        let gt_eq = MatchRule::new(Operator::GtEq, 0, false, &[5]);
        assert!(gt_eq.matches(&[5], 0));
        assert!(gt_eq.matches(&[6], 0));
        assert!(!gt_eq.matches(&[4], 0));
    }
}
