//! Message filters rewriting or swallowing event triggers
//!
//! Each filter matches an inclusive (message, value) window. Matching filters
//! apply in chain order, each seeing the previous one's rewrite. A matching
//! filter that changes neither message nor value swallows the trigger.

/// Operator applied to the value of a matching message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    /// Keep the value
    Unchanged,
    /// Replace the value with the operand
    Set,
    /// `value * operand + add`
    MultAdd,
    /// `value / operand + add` (a zero operand yields `add`)
    DivAdd,
    /// `value * operand / 100 + add`
    PercentAdd,
    /// `value * operand / 1000 + add`
    PermillAdd,
    /// `value % operand + add` (a zero operand yields `add`)
    ModAdd,
    /// `min(value, operand) + add`
    MinAdd,
    /// `max(value, operand) + add`
    MaxAdd,
}

/// A single message filter
#[derive(Debug, Clone, Copy)]
pub struct MsgFilter {
    /// Lowest matching message (inclusive)
    pub from_msg: i32,
    /// Highest matching message (inclusive)
    pub to_msg: i32,
    /// Lowest matching value (inclusive)
    pub from_value: i32,
    /// Highest matching value (inclusive)
    pub to_value: i32,
    /// Replacement message, or `None` to keep the incoming one
    pub out_msg: Option<i32>,
    /// Operator applied to the value
    pub op: ValueOp,
    /// Operand of the operator
    pub operand: i32,
    /// Constant added after the operator
    pub add: i32,
}

impl MsgFilter {
    /// A filter matching a message range and leaving everything unchanged
    ///
    /// On its own this swallows every matching trigger; set `out_msg` or a
    /// value operator to turn it into a rewrite.
    pub const fn matching(from_msg: i32, to_msg: i32) -> Self {
        Self {
            from_msg,
            to_msg,
            from_value: i32::MIN,
            to_value: i32::MAX,
            out_msg: None,
            op: ValueOp::Unchanged,
            operand: 0,
            add: 0,
        }
    }

    /// Whether the filter matches an incoming message and value
    pub const fn matches(&self, msg: i32, value: i32) -> bool {
        msg >= self.from_msg && msg <= self.to_msg && value >= self.from_value && value <= self.to_value
    }

    /// Apply the value operator
    fn apply_value(&self, value: i32) -> i32 {
        let operand = f64::from(self.operand);
        let add = f64::from(self.add);
        let value_f = f64::from(value);
        let result = match self.op {
            ValueOp::Unchanged => return value,
            ValueOp::Set => return self.operand,
            ValueOp::MultAdd => value_f * operand + add,
            ValueOp::DivAdd => {
                if self.operand == 0 {
                    add
                } else {
                    value_f / operand + add
                }
            }
            ValueOp::PercentAdd => value_f * operand / 100.0 + add,
            ValueOp::PermillAdd => value_f * operand / 1000.0 + add,
            ValueOp::ModAdd => {
                if self.operand == 0 {
                    add
                } else {
                    f64::from(value % self.operand) + add
                }
            }
            ValueOp::MinAdd => f64::from(value.min(self.operand)) + add,
            ValueOp::MaxAdd => f64::from(value.max(self.operand)) + add,
        };
        clamp_to_i32(result)
    }
}

/// Run a filter chain over a message, rewriting it in place
///
/// Returns `false` when a matching filter swallowed the message.
pub(crate) fn filter_msg(filters: &[MsgFilter], msg: &mut i32, value: &mut i32) -> bool {
    for filter in filters {
        if !filter.matches(*msg, *value) {
            continue;
        }
        if filter.out_msg.is_none() && filter.op == ValueOp::Unchanged {
            // matches but rewrites nothing: swallowed
            return false;
        }
        if let Some(out) = filter.out_msg {
            *msg = out;
        }
        *value = filter.apply_value(*value);
    }
    true
}

/// Saturate a floating intermediate back into the value domain
fn clamp_to_i32(check: f64) -> i32 {
    if check > f64::from(i32::MAX) {
        i32::MAX
    } else if check < f64::from(i32::MIN) {
        i32::MIN
    } else {
        check as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_filter_without_rewrite_swallows() {
        let filters = [MsgFilter::matching(3, 5)];
        let (mut msg, mut value) = (4, 100);
        assert!(!filter_msg(&filters, &mut msg, &mut value));
        msg = 6;
        assert!(filter_msg(&filters, &mut msg, &mut value));
    }

    #[test]
    fn test_rewrite_chains_through_later_filters() {
        let first = MsgFilter {
            out_msg: Some(10),
            op: ValueOp::MultAdd,
            operand: 2,
            add: 1,
            ..MsgFilter::matching(0, 0)
        };
        let second = MsgFilter {
            op: ValueOp::Set,
            operand: 7,
            ..MsgFilter::matching(10, 10)
        };
        let (mut msg, mut value) = (0, 20);
        assert!(filter_msg(&[first, second], &mut msg, &mut value));
        // first rewrote msg to 10 and value to 41; second then set value to 7
        assert_eq!(msg, 10);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_value_operators_saturate() {
        let filter = MsgFilter {
            op: ValueOp::MultAdd,
            operand: i32::MAX,
            add: i32::MAX,
            ..MsgFilter::matching(i32::MIN, i32::MAX)
        };
        let (mut msg, mut value) = (0, i32::MAX);
        assert!(filter_msg(&[filter], &mut msg, &mut value));
        assert_eq!(value, i32::MAX);
    }
}
