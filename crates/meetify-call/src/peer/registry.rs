use std::collections::BTreeMap;

use meetify_common::ParticipantId;

use super::link::PeerLink;

/// Links keyed by remote participant. At most one live link per id.
#[derive(Default)]
pub struct PeerRegistry {
    links: BTreeMap<ParticipantId, PeerLink>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.links.contains_key(id)
    }

    /// Insert a link, handing back any link it displaced.
    pub fn insert(&mut self, link: PeerLink) -> Option<PeerLink> {
        self.links.insert(link.remote_id().clone(), link)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(id)
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut PeerLink> {
        self.links.get_mut(id)
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<PeerLink> {
        self.links.remove(id)
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.links.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerLink> {
        self.links.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerLink> {
        self.links.values_mut()
    }

    /// Remove and return every link.
    pub fn drain(&mut self) -> Vec<PeerLink> {
        std::mem::take(&mut self.links).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
