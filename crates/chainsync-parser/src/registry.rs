//! Message type registry: maps a protobuf type URL to the command that parses it.
//!
//! A type URL can change meaning across chain upgrades, so each entry is a
//! list of `(since_protocol_version, kind, command_version)` and the active
//! protocol version at a height comes from the [`UpgradeSchedule`].

use std::collections::{BTreeMap, HashMap};

use chainsync_core::types::Height;

/// Which message command to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    Send,
    MultiSend,
    Delegate,
    Undelegate,
    BeginRedelegate,
    WithdrawDelegatorReward,
    WithdrawValidatorCommission,
    SetWithdrawAddress,
    CreateValidator,
    EditValidator,
    SubmitProposal,
    Vote,
    Deposit,
    Unjail,
    Unknown,
}

impl MsgKind {
    /// Name of the command that handles this message kind.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Send => "CreateMsgSend",
            Self::MultiSend => "CreateMsgMultiSend",
            Self::Delegate => "CreateMsgDelegate",
            Self::Undelegate => "CreateMsgUndelegate",
            Self::BeginRedelegate => "CreateMsgBeginRedelegate",
            Self::WithdrawDelegatorReward => "CreateMsgWithdrawDelegatorReward",
            Self::WithdrawValidatorCommission => "CreateMsgWithdrawValidatorCommission",
            Self::SetWithdrawAddress => "CreateMsgSetWithdrawAddress",
            Self::CreateValidator => "CreateMsgCreateValidator",
            Self::EditValidator => "CreateMsgEditValidator",
            Self::SubmitProposal => "CreateMsgSubmitProposal",
            Self::Vote => "CreateMsgVote",
            Self::Deposit => "CreateMsgDeposit",
            Self::Unjail => "CreateMsgUnjail",
            Self::Unknown => "CreateMsgUnknown",
        }
    }
}

/// Resolved registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgRoute {
    pub kind: MsgKind,
    pub command_version: u32,
}

impl MsgRoute {
    pub const UNKNOWN: MsgRoute = MsgRoute {
        kind: MsgKind::Unknown,
        command_version: 0,
    };
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    since: u32,
    route: MsgRoute,
}

/// Chain upgrade heights. Protocol version 0 is active from genesis.
#[derive(Debug, Clone, Default)]
pub struct UpgradeSchedule {
    upgrades: BTreeMap<Height, u32>,
}

impl UpgradeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protocol `version` becomes active at `height` (inclusive).
    pub fn with_upgrade(mut self, height: Height, version: u32) -> Self {
        self.upgrades.insert(height, version);
        self
    }

    pub fn protocol_version_at(&self, height: Height) -> u32 {
        self.upgrades
            .range(..=height)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }
}

/// Type URL → message command routing table.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    entries: HashMap<String, Vec<Entry>>,
    schedule: UpgradeSchedule,
}

impl ParserRegistry {
    /// An empty registry; every message resolves to [`MsgKind::Unknown`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Cosmos SDK bank, staking, distribution, gov and
    /// slashing messages.
    pub fn cosmos_sdk() -> Self {
        use MsgKind::*;
        let mut r = Self::new();
        for (url, kind) in [
            ("/cosmos.bank.v1beta1.MsgSend", Send),
            ("/cosmos.bank.v1beta1.MsgMultiSend", MultiSend),
            ("/cosmos.staking.v1beta1.MsgDelegate", Delegate),
            ("/cosmos.staking.v1beta1.MsgUndelegate", Undelegate),
            ("/cosmos.staking.v1beta1.MsgBeginRedelegate", BeginRedelegate),
            ("/cosmos.staking.v1beta1.MsgCreateValidator", CreateValidator),
            ("/cosmos.staking.v1beta1.MsgEditValidator", EditValidator),
            ("/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward", WithdrawDelegatorReward),
            ("/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission", WithdrawValidatorCommission),
            ("/cosmos.distribution.v1beta1.MsgSetWithdrawAddress", SetWithdrawAddress),
            ("/cosmos.gov.v1beta1.MsgSubmitProposal", SubmitProposal),
            ("/cosmos.gov.v1beta1.MsgVote", Vote),
            ("/cosmos.gov.v1beta1.MsgDeposit", Deposit),
            ("/cosmos.slashing.v1beta1.MsgUnjail", Unjail),
        ] {
            r.register(url, 0, kind, 1);
        }
        // gov v1 messages carry a different shape
        r.register("/cosmos.gov.v1.MsgSubmitProposal", 0, SubmitProposal, 2);
        r.register("/cosmos.gov.v1.MsgVote", 0, Vote, 2);
        r.register("/cosmos.gov.v1.MsgDeposit", 0, Deposit, 2);
        r
    }

    pub fn with_schedule(mut self, schedule: UpgradeSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Route `type_url` to `kind` from protocol version `since` onwards.
    pub fn register(&mut self, type_url: &str, since: u32, kind: MsgKind, command_version: u32) {
        let list = self.entries.entry(type_url.to_string()).or_default();
        list.retain(|e| e.since != since);
        list.push(Entry {
            since,
            route: MsgRoute {
                kind,
                command_version,
            },
        });
        list.sort_by_key(|e| e.since);
    }

    /// Route for a message found at `height`.
    pub fn resolve(&self, type_url: &str, height: Height) -> MsgRoute {
        let protocol = self.schedule.protocol_version_at(height);
        self.entries
            .get(type_url)
            .and_then(|list| list.iter().rev().find(|e| e.since <= protocol))
            .map(|e| e.route)
            .unwrap_or(MsgRoute::UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_gov_versions() {
        let r = ParserRegistry::cosmos_sdk();
        let v1beta1 = r.resolve("/cosmos.gov.v1beta1.MsgSubmitProposal", 10);
        let v1 = r.resolve("/cosmos.gov.v1.MsgSubmitProposal", 10);
        assert_eq!(v1beta1.kind, MsgKind::SubmitProposal);
        assert_eq!((v1beta1.command_version, v1.command_version), (1, 2));
        assert_eq!(v1.kind.command_name(), "CreateMsgSubmitProposal");
    }

    #[test]
    fn unknown_type_url() {
        let r = ParserRegistry::cosmos_sdk();
        assert_eq!(
            r.resolve("/ibc.core.client.v1.MsgUpdateClient", 1),
            MsgRoute::UNKNOWN
        );
    }

    #[test]
    fn upgrades_switch_routes_by_height() {
        let mut r = ParserRegistry::new()
            .with_schedule(UpgradeSchedule::new().with_upgrade(1000, 1).with_upgrade(5000, 2));
        r.register("/custom.MsgThing", 0, MsgKind::Send, 1);
        r.register("/custom.MsgThing", 2, MsgKind::Send, 3);
        r.register("/custom.MsgLate", 1, MsgKind::Vote, 1);

        assert_eq!(r.resolve("/custom.MsgThing", 999).command_version, 1);
        assert_eq!(r.resolve("/custom.MsgThing", 4999).command_version, 1);
        assert_eq!(r.resolve("/custom.MsgThing", 5000).command_version, 3);
        assert_eq!(r.resolve("/custom.MsgLate", 999).kind, MsgKind::Unknown);
        assert_eq!(r.resolve("/custom.MsgLate", 1000).kind, MsgKind::Vote);
    }

    #[test]
    fn protocol_version_lookup() {
        let s = UpgradeSchedule::new().with_upgrade(10, 4);
        assert_eq!(s.protocol_version_at(0), 0);
        assert_eq!(s.protocol_version_at(10), 4);
        assert_eq!(s.protocol_version_at(u64::MAX), 4);
    }
}
