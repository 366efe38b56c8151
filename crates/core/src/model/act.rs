use serde::{Deserialize, Serialize};

use super::association::{ActParticipation, ActRelationship, Extension, Identifier, Note, Tag};
use super::meta::{RecordMeta, VersionInfo};
use crate::concepts::{act_class, mood};
use crate::ids::Key;
use crate::impl_record;
use crate::time::Timestamp;

/// An event: an observation, an administration, an encounter or a control act.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub key: Option<Key>,
    pub version: VersionInfo,
    pub meta: RecordMeta,
    pub class_concept_key: Option<Key>,
    pub mood_concept_key: Option<Key>,
    pub status_concept_key: Option<Key>,
    pub type_concept_key: Option<Key>,
    pub act_time: Option<Timestamp>,
    pub start_time: Option<Timestamp>,
    pub stop_time: Option<Timestamp>,
    pub is_negated: bool,
    pub identifiers: Vec<Identifier>,
    pub tags: Vec<Tag>,
    pub extensions: Vec<Extension>,
    pub notes: Vec<Note>,
    pub relationships: Vec<ActRelationship>,
    pub participations: Vec<ActParticipation>,
    pub detail: ActDetail,
}
impl_record!(versioned Act);

impl Act {
    pub fn of_kind(kind: ActKind) -> Self {
        Self {
            class_concept_key: Some(kind.class_key()),
            mood_concept_key: Some(mood::EVENT_OCCURRENCE),
            detail: ActDetail::default_for(kind),
            ..Default::default()
        }
    }

    pub fn observation(value: ObservationValue) -> Self {
        let mut act = Self::of_kind(ActKind::Observation);
        act.detail = ActDetail::Observation(ObservationDetail {
            value,
            ..Default::default()
        });
        act
    }

    /// Observation variants resolve by the value tag as well as the class.
    pub fn kind(&self) -> ActKind {
        let tag = match &self.detail {
            ActDetail::Observation(o) => o.value.tag(),
            _ => None,
        };
        ActKind::resolve(self.class_concept_key, tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActKind {
    Generic,
    Observation,
    QuantityObservation,
    TextObservation,
    CodedObservation,
    SubstanceAdministration,
    PatientEncounter,
    ControlAct,
}

impl ActKind {
    pub fn resolve(class: Option<Key>, value_tag: Option<&str>) -> Self {
        match class {
            Some(c) if c == act_class::OBSERVATION => match value_tag {
                Some(ObservationValue::QUANTITY_TAG) => ActKind::QuantityObservation,
                Some(ObservationValue::TEXT_TAG) => ActKind::TextObservation,
                Some(ObservationValue::CODED_TAG) => ActKind::CodedObservation,
                _ => ActKind::Observation,
            },
            Some(c) if c == act_class::SUBSTANCE_ADMINISTRATION => ActKind::SubstanceAdministration,
            Some(c) if c == act_class::ENCOUNTER => ActKind::PatientEncounter,
            Some(c) if c == act_class::CONTROL_ACT => ActKind::ControlAct,
            _ => ActKind::Generic,
        }
    }

    pub fn class_key(&self) -> Key {
        match self {
            ActKind::Generic => act_class::ACT,
            ActKind::Observation
            | ActKind::QuantityObservation
            | ActKind::TextObservation
            | ActKind::CodedObservation => act_class::OBSERVATION,
            ActKind::SubstanceAdministration => act_class::SUBSTANCE_ADMINISTRATION,
            ActKind::PatientEncounter => act_class::ENCOUNTER,
            ActKind::ControlAct => act_class::CONTROL_ACT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ActDetail {
    #[default]
    Generic,
    Observation(ObservationDetail),
    SubstanceAdministration(SubstanceAdministrationDetail),
    PatientEncounter(PatientEncounterDetail),
    ControlAct,
}

impl ActDetail {
    pub fn default_for(kind: ActKind) -> Self {
        match kind {
            ActKind::Generic => ActDetail::Generic,
            ActKind::Observation => ActDetail::Observation(Default::default()),
            ActKind::QuantityObservation => ActDetail::Observation(ObservationDetail {
                value: ObservationValue::Quantity {
                    value: 0.0,
                    unit_concept_key: None,
                },
                ..Default::default()
            }),
            ActKind::TextObservation => ActDetail::Observation(ObservationDetail {
                value: ObservationValue::Text(String::new()),
                ..Default::default()
            }),
            ActKind::CodedObservation => ActDetail::Observation(ObservationDetail {
                value: ObservationValue::Coded(None),
                ..Default::default()
            }),
            ActKind::SubstanceAdministration => {
                ActDetail::SubstanceAdministration(Default::default())
            }
            ActKind::PatientEncounter => ActDetail::PatientEncounter(Default::default()),
            ActKind::ControlAct => ActDetail::ControlAct,
        }
    }

    pub fn as_observation(&self) -> Option<&ObservationDetail> {
        match self {
            ActDetail::Observation(o) => Some(o),
            _ => None,
        }
    }

    pub fn observation_mut(&mut self) -> Option<&mut ObservationDetail> {
        match self {
            ActDetail::Observation(o) => Some(o),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationDetail {
    pub interpretation_concept_key: Option<Key>,
    pub value: ObservationValue,
}

/// Observation value variants, discriminated on disk by a short type tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ObservationValue {
    #[default]
    None,
    Quantity {
        value: f64,
        unit_concept_key: Option<Key>,
    },
    Text(String),
    Coded(Option<Key>),
}

impl ObservationValue {
    pub const QUANTITY_TAG: &'static str = "PQ";
    pub const TEXT_TAG: &'static str = "ST";
    pub const CODED_TAG: &'static str = "CD";

    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ObservationValue::None => None,
            ObservationValue::Quantity { .. } => Some(Self::QUANTITY_TAG),
            ObservationValue::Text(_) => Some(Self::TEXT_TAG),
            ObservationValue::Coded(_) => Some(Self::CODED_TAG),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubstanceAdministrationDetail {
    pub route_concept_key: Option<Key>,
    pub dose_quantity: Option<f64>,
    pub dose_unit_concept_key: Option<Key>,
    pub sequence_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientEncounterDetail {
    pub discharge_disposition_key: Option<Key>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_kind_follows_value_tag() {
        let act = Act::observation(ObservationValue::Text("positive".into()));
        assert_eq!(act.kind(), ActKind::TextObservation);

        let bare = Act::of_kind(ActKind::Observation);
        assert_eq!(bare.kind(), ActKind::Observation);

        assert_eq!(ActKind::resolve(Some(Key::new()), None), ActKind::Generic);
    }
}
