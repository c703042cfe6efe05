use serde::Serialize;

/// A queryable grouping of procedures, phenomena and features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservationOffering {
    pub name: String,
    pub description: Option<String>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub procedures: Vec<String>,
    pub phenomena: Vec<String>,
    pub features_of_interest: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Phenomenon {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureOfInterest {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Geometry as stored, typically WKT
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub id: String,
    pub procedure: Option<String>,
    pub phenomenon: Option<String>,
    pub feature_of_interest: Option<String>,
    pub begin_time: Option<String>,
    /// `None` for an instantaneous observation
    pub end_time: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    pub time: Option<String>,
    pub value: Option<String>,
}

/// Time/value series of one result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservationResult {
    pub id: String,
    pub entries: Vec<ResultEntry>,
}
