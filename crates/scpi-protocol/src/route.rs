//! Cached relay route state
//!
//! The instrument is never asked which channels are closed. The driver keeps
//! its own record of what it last closed successfully and only toggles the
//! channels whose state changes.

use std::fmt;
use std::str::FromStr;

use crate::command::Channel;

/// Duplicate-free list of channels.
///
/// Channels keep their first-seen order, which is the order they go out on
/// the wire. Equality ignores that order.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet(Vec<Channel>);

impl ChannelSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[Channel] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains(&channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.iter().copied()
    }

    /// Adds the channel unless already present
    pub fn insert(&mut self, channel: Channel) -> bool {
        if self.contains(channel) {
            return false;
        }
        self.0.push(channel);
        true
    }

    /// Channels of `self` not in `other`, in `self` order
    pub fn difference(&self, other: &ChannelSet) -> ChannelSet {
        self.iter().filter(|c| !other.contains(*c)).collect()
    }

    /// Channels of `self` followed by the new ones from `other`
    pub fn union(&self, other: &ChannelSet) -> ChannelSet {
        self.iter().chain(other.iter()).collect()
    }
}

impl PartialEq for ChannelSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|c| other.contains(c))
    }
}

impl Eq for ChannelSet {}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        let mut set = ChannelSet::new();
        for channel in iter {
            set.insert(channel);
        }
        set
    }
}

impl From<Vec<Channel>> for ChannelSet {
    fn from(channels: Vec<Channel>) -> Self {
        channels.into_iter().collect()
    }
}

impl From<&[Channel]> for ChannelSet {
    fn from(channels: &[Channel]) -> Self {
        channels.iter().copied().collect()
    }
}

impl<const N: usize> From<[Channel; N]> for ChannelSet {
    fn from(channels: [Channel; N]) -> Self {
        channels.into_iter().collect()
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, channel) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", channel)?;
        }
        Ok(())
    }
}

/// Parses `1,2,3`; an empty string is the empty set
impl FromStr for ChannelSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(ChannelSet::new());
        }
        s.split(',')
            .map(|c| {
                c.trim()
                    .parse::<Channel>()
                    .map_err(|_| format!("Invalid channel: {}", c.trim()))
            })
            .collect()
    }
}

/// Commands needed to move from the cached route to a requested one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    /// Channels to open, issued first
    pub open: ChannelSet,
    /// Channels to close, issued after the opens
    pub close: ChannelSet,
}

impl RoutePlan {
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.close.is_empty()
    }
}

/// What the driver believes about the instrument's closed channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteState {
    /// Exactly these channels are closed
    Confirmed(ChannelSet),
    /// Hardware state is not known; at most these channels may be closed
    Unknown { maybe_closed: ChannelSet },
}

impl RouteState {
    /// State after an instrument reset: every channel open
    pub fn all_open() -> Self {
        RouteState::Confirmed(ChannelSet::new())
    }

    /// State with no knowledge of the hardware
    pub fn unknown() -> Self {
        RouteState::Unknown {
            maybe_closed: ChannelSet::new(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, RouteState::Confirmed(_))
    }

    /// Closed channels, if known
    pub fn closed(&self) -> Option<&ChannelSet> {
        match self {
            RouteState::Confirmed(closed) => Some(closed),
            RouteState::Unknown { .. } => None,
        }
    }

    /// Every channel that is or might be closed
    pub fn maybe_closed(&self) -> &ChannelSet {
        match self {
            RouteState::Confirmed(closed) => closed,
            RouteState::Unknown { maybe_closed } => maybe_closed,
        }
    }

    /// Diff the cached route against `requested`.
    ///
    /// From an unknown state every requested channel is closed again, since
    /// none of them can be assumed closed already.
    pub fn diff(&self, requested: &ChannelSet) -> RoutePlan {
        match self {
            RouteState::Confirmed(closed) => RoutePlan {
                open: closed.difference(requested),
                close: requested.difference(closed),
            },
            RouteState::Unknown { maybe_closed } => RoutePlan {
                open: maybe_closed.difference(requested),
                close: requested.clone(),
            },
        }
    }

    /// Record that the instrument now has exactly `closed` closed
    pub fn confirm(&mut self, closed: ChannelSet) {
        *self = RouteState::Confirmed(closed);
    }

    /// Record that a route change failed part way.
    ///
    /// `attempted_close` holds the channels whose close command was sent, or
    /// is empty if the failure came before any close.
    pub fn desynchronize(&mut self, attempted_close: &ChannelSet) {
        let maybe_closed = self.maybe_closed().union(attempted_close);
        *self = RouteState::Unknown { maybe_closed };
    }

    /// Forget everything, e.g. on disconnect
    pub fn reset(&mut self) {
        *self = RouteState::unknown();
    }
}

impl Default for RouteState {
    fn default() -> Self {
        RouteState::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(channels: &[Channel]) -> ChannelSet {
        ChannelSet::from(channels)
    }

    #[test]
    fn test_channel_set_dedups_in_order() {
        let channels = ChannelSet::from(vec![3, 1, 3, 2, 1]);
        assert_eq!(channels.as_slice(), &[3, 1, 2]);
        assert_eq!(channels.to_string(), "3,1,2");
    }

    #[test]
    fn test_channel_set_equality_ignores_order() {
        assert_eq!(set(&[1, 2, 3]), set(&[3, 1, 2]));
        assert_ne!(set(&[1, 2]), set(&[1, 2, 3]));
        assert_ne!(set(&[1, 2]), set(&[1, 3]));
        assert_eq!(RouteState::Confirmed(set(&[1, 2])), RouteState::Confirmed(set(&[2, 1])));
        // order still reaches the wire
        assert_eq!(set(&[2, 1]).to_string(), "2,1");
    }

    #[test]
    fn test_channel_set_from_str() {
        assert_eq!("1, 2,3".parse::<ChannelSet>().unwrap(), set(&[1, 2, 3]));
        assert_eq!("".parse::<ChannelSet>().unwrap(), ChannelSet::new());
        assert!("1,a".parse::<ChannelSet>().is_err());
    }

    #[test]
    fn test_diff_from_all_open() {
        let state = RouteState::all_open();
        let plan = state.diff(&set(&[1, 2]));
        assert!(plan.open.is_empty());
        assert_eq!(plan.close, set(&[1, 2]));
    }

    #[test]
    fn test_diff_keeps_common_channels() {
        let state = RouteState::Confirmed(set(&[1, 2]));
        let plan = state.diff(&set(&[2, 3]));
        assert_eq!(plan.open, set(&[1]));
        assert_eq!(plan.close, set(&[3]));
    }

    #[test]
    fn test_diff_same_route_is_empty() {
        let state = RouteState::Confirmed(set(&[4, 5]));
        assert!(state.diff(&set(&[5, 4])).is_empty());
    }

    #[test]
    fn test_diff_to_empty_opens_all() {
        let state = RouteState::Confirmed(set(&[4, 5]));
        let plan = state.diff(&ChannelSet::new());
        assert_eq!(plan.open, set(&[4, 5]));
        assert!(plan.close.is_empty());
    }

    #[test]
    fn test_diff_from_unknown_recloses_requested() {
        let state = RouteState::Unknown {
            maybe_closed: set(&[1, 2, 3]),
        };
        let plan = state.diff(&set(&[2, 9]));
        assert_eq!(plan.open, set(&[1, 3]));
        assert_eq!(plan.close, set(&[2, 9]));
    }

    #[test]
    fn test_desynchronize_tracks_attempted_closes() {
        let mut state = RouteState::Confirmed(set(&[1, 2]));
        let plan = state.diff(&set(&[2, 3]));
        state.desynchronize(&plan.close);

        assert!(!state.is_known());
        assert_eq!(state.closed(), None);
        assert_eq!(state.maybe_closed(), &set(&[1, 2, 3]));
    }

    #[test]
    fn test_desynchronize_before_close_keeps_previous() {
        let mut state = RouteState::Confirmed(set(&[1, 2]));
        state.desynchronize(&ChannelSet::new());
        assert_eq!(state.maybe_closed(), &set(&[1, 2]));

        // channel 3 was never closed, so it is not reopened
        let plan = state.diff(&set(&[3]));
        assert_eq!(plan.open, set(&[1, 2]));
        assert_eq!(plan.close, set(&[3]));

        let plan = state.diff(&set(&[1]));
        assert_eq!(plan.open, set(&[2]));
        assert_eq!(plan.close, set(&[1]));
    }

    #[test]
    fn test_reset() {
        let mut state = RouteState::Confirmed(set(&[1]));
        state.reset();
        assert_eq!(state, RouteState::unknown());
        assert!(state.diff(&ChannelSet::new()).is_empty());
    }
}
