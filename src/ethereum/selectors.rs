use alloy::json_abi::{Event, Function, JsonAbi, StateMutability};
use alloy::primitives::{keccak256, FixedBytes, B256};
use std::collections::HashMap;
use tracing::debug;

/// The 4-byte prefix of a function's signature hash.
pub type Selector = FixedBytes<4>;

/// Whether an interface entry describes a function or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Function,
    Event,
}

/// A parameter as declared in the interface description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
    /// Only meaningful for event parameters.
    pub indexed: bool,
}

/// One function or event of a contract interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceEntry {
    Function(Function),
    Event(Event),
}

impl InterfaceEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Function(_) => EntryKind::Function,
            Self::Event(_) => EntryKind::Event,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Function(function) => &function.name,
            Self::Event(event) => &event.name,
        }
    }

    /// Canonical signature, `name(type1,type2,...)`, with tuples expanded.
    pub fn signature(&self) -> String {
        match self {
            Self::Function(function) => function.signature(),
            Self::Event(event) => event.signature(),
        }
    }

    /// Full-width hash of the canonical signature.
    pub fn hash(&self) -> B256 {
        signature_hash(&self.signature())
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        match self {
            Self::Function(function) => function
                .inputs
                .iter()
                .map(|input| Parameter {
                    name: input.name.clone(),
                    ty: input.selector_type().into_owned(),
                    indexed: false,
                })
                .collect(),
            Self::Event(event) => event
                .inputs
                .iter()
                .map(|input| Parameter {
                    name: input.name.clone(),
                    ty: input.selector_type().into_owned(),
                    indexed: input.indexed,
                })
                .collect(),
        }
    }

    pub fn state_mutability(&self) -> Option<StateMutability> {
        match self {
            Self::Function(function) => Some(function.state_mutability),
            Self::Event(_) => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Function(_) => None,
            Self::Event(event) => Some(event),
        }
    }
}

/// Keccak-256 over the UTF-8 bytes of a canonical signature.
pub fn signature_hash(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Truncates a full signature hash to the 4-byte function selector.
pub fn selector_prefix(hash: &B256) -> Selector {
    Selector::from_slice(&hash[..4])
}

/// Signature hash → interface entry, built once per contract interface.
///
/// Two entries hashing identically are not reconciled: the first one inserted is
/// kept. Functions are inserted before events.
#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    entries: HashMap<B256, InterfaceEntry>,
    function_prefixes: HashMap<Selector, B256>,
}

impl SelectorTable {
    pub fn build(abi: &JsonAbi) -> Self {
        let mut table = Self::default();

        let entries = abi
            .functions()
            .cloned()
            .map(InterfaceEntry::Function)
            .chain(abi.events().cloned().map(InterfaceEntry::Event));

        for entry in entries {
            table.insert(entry);
        }

        debug!("Built selector table with {} entries", table.entries.len());
        table
    }

    fn insert(&mut self, entry: InterfaceEntry) {
        let hash = entry.hash();
        if self.entries.contains_key(&hash) {
            debug!(
                "Selector collision for {}, keeping the first entry",
                entry.signature()
            );
            return;
        }
        if entry.kind() == EntryKind::Function {
            self.function_prefixes
                .entry(selector_prefix(&hash))
                .or_insert(hash);
        }
        self.entries.insert(hash, entry);
    }

    pub fn resolve(&self, hash: &B256) -> Option<&InterfaceEntry> {
        self.entries.get(hash)
    }

    pub fn resolve_event(&self, topic: &B256) -> Option<&Event> {
        self.resolve(topic).and_then(InterfaceEntry::as_event)
    }

    /// Looks a function up by the leading 4 bytes of call-data.
    pub fn resolve_function(&self, selector: &[u8]) -> Option<&Function> {
        if selector.len() < 4 {
            return None;
        }
        let prefix = Selector::from_slice(&selector[..4]);
        self.function_prefixes
            .get(&prefix)
            .and_then(|hash| self.resolve(hash))
            .and_then(InterfaceEntry::as_function)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&B256, &InterfaceEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::erc20_abi;
    use alloy::primitives::{b256, hex};

    #[test]
    fn test_event_selector_matches_known_topic() {
        let table = SelectorTable::build(&erc20_abi());
        let transfer_topic =
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

        let event = table.resolve_event(&transfer_topic).unwrap();
        assert_eq!(event.name, "Transfer");
    }

    #[test]
    fn test_function_selector_prefix() {
        let table = SelectorTable::build(&erc20_abi());
        let function = table.resolve_function(&hex!("a9059cbb")).unwrap();
        assert_eq!(function.name, "transfer");

        assert!(table.resolve_function(&hex!("deadbeef")).is_none());
        assert!(table.resolve_function(&hex!("a905")).is_none());
    }

    #[test]
    fn test_every_entry_round_trips() {
        let abi = erc20_abi();
        let table = SelectorTable::build(&abi);
        assert_eq!(table.len(), abi.functions().count() + abi.events().count());

        for (hash, entry) in table.iter() {
            assert_eq!(signature_hash(&entry.signature()), *hash);
            assert_eq!(table.resolve(&entry.hash()), Some(entry));
        }
    }

    #[test]
    fn test_unknown_hash_is_not_found() {
        let table = SelectorTable::build(&erc20_abi());
        assert!(table.resolve(&B256::ZERO).is_none());
        assert!(table.resolve_event(&B256::ZERO).is_none());
    }

    #[test]
    fn test_entry_parameters_keep_declaration_order() {
        let table = SelectorTable::build(&erc20_abi());
        let transfer_topic =
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
        let entry = table.resolve(&transfer_topic).unwrap();

        assert_eq!(entry.kind(), EntryKind::Event);
        assert_eq!(entry.signature(), "Transfer(address,address,uint256)");
        let params = entry.parameters();
        let indexed: Vec<bool> = params.iter().map(|p| p.indexed).collect();
        assert_eq!(indexed, vec![true, true, false]);
        assert_eq!(params[2].name, "value");
        assert!(entry.state_mutability().is_none());
    }
}
