// Forward-only transitions between workflow partitions

use chrono::{DateTime, Utc};

use crate::notify::{DELIVERED_MESSAGE, READY_FOR_DELIVERY_MESSAGE};
use crate::store::{ContactRecord, Partition, RecordId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// InWork -> ReadyForDelivery
    MarkReady { id: RecordId, name: String, phone: String },
    /// ReadyForDelivery -> History
    MarkDelivered { id: RecordId, name: String, phone: String },
}

impl Transition {
    pub fn mark_ready(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Transition::MarkReady {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }

    pub fn mark_delivered(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Transition::MarkDelivered {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Transition::MarkReady { .. } => "mark_ready",
            Transition::MarkDelivered { .. } => "mark_delivered",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Transition::MarkReady { id, .. } | Transition::MarkDelivered { id, .. } => id,
        }
    }

    pub fn phone(&self) -> &str {
        match self {
            Transition::MarkReady { phone, .. } | Transition::MarkDelivered { phone, .. } => phone,
        }
    }

    pub fn source(&self) -> Partition {
        match self {
            Transition::MarkReady { .. } => Partition::InWork,
            Transition::MarkDelivered { .. } => Partition::ReadyForDelivery,
        }
    }

    pub fn destination(&self) -> Partition {
        match self {
            Transition::MarkReady { .. } => Partition::ReadyForDelivery,
            Transition::MarkDelivered { .. } => Partition::History,
        }
    }

    /// The record written to the destination partition. Name and phone come
    /// from the caller, not from the record being removed.
    pub fn destination_record(&self, now: DateTime<Utc>) -> ContactRecord {
        match self {
            Transition::MarkReady { name, phone, .. } => ContactRecord::new(name, phone),
            Transition::MarkDelivered { name, phone, .. } => {
                ContactRecord::new(name, phone).delivered(now)
            }
        }
    }

    pub fn notification(&self) -> &'static str {
        match self {
            Transition::MarkReady { .. } => READY_FOR_DELIVERY_MESSAGE,
            Transition::MarkDelivered { .. } => DELIVERED_MESSAGE,
        }
    }

    /// Source and destination must be adjacent in the partition order
    pub fn is_forward(&self) -> bool {
        self.source().next() == Some(self.destination())
    }
}
