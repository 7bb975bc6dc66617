//! Plant list filtering.
//!
//! The plant browser, the study deck builder and collection pages all narrow the same in-memory
//! list of visible plants. [`PlantFilter`] is the shared description of that narrowing: it is read
//! from the query string of `GET /api/v1/plants`, embedded in study session requests, and can be
//! written back to a canonical query string so a client can keep its URL in sync with the filter
//! panel.
//!
//! [`apply_filters`] runs a fixed sequence of predicates and never reorders its input; ordering is
//! a separate step ([`sort_plants`]).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::types::{CollectionId, PlantId};

/// Ordering of a plant list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlantSort {
    /// Common name, then scientific name
    Name,
    Scientific,
    /// Most recently added first
    Newest,
}

/// Criteria for narrowing a plant list. Every field is optional; an empty filter matches everything.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PlantFilter {
    /// Case-insensitive substring of the common or scientific name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Exact family, ignoring case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Exact genus, ignoring case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    /// Only plants in this collection
    #[serde(skip_serializing_if = "Option::is_none")]
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub collection_id: Option<CollectionId>,
    /// Only the caller's favorites
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub favorites_only: Option<bool>,
    /// Only plants with (or without) at least one image
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub has_image: Option<bool>,
    /// Only published (or unpublished) plants
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<PlantSort>,
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PlantFilter {
    /// Trim text fields and drop the ones left empty.
    pub fn normalized(self) -> Self {
        Self {
            search: clean(self.search),
            family: clean(self.family),
            genus: clean(self.genus),
            // `favorites_only=false` means the same as not asking
            favorites_only: self.favorites_only.filter(|f| *f),
            ..self
        }
    }

    /// True when the filter would keep every plant
    pub fn is_empty(&self) -> bool {
        let normalized = self.clone().normalized();
        normalized.search.is_none()
            && normalized.family.is_none()
            && normalized.genus.is_none()
            && normalized.collection_id.is_none()
            && normalized.favorites_only.is_none()
            && normalized.has_image.is_none()
            && normalized.published.is_none()
    }

    /// Canonical query string for this filter, without a leading `?`. Empty when nothing is set.
    pub fn to_query_string(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self.clone().normalized())
    }

    /// Inverse of [`PlantFilter::to_query_string`]; unknown keys are ignored.
    pub fn from_query_string(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        let filter: Self = serde_urlencoded::from_str(query.trim_start_matches('?'))?;
        Ok(filter.normalized())
    }
}

/// The fields filtering and sorting need from a plant.
pub trait PlantRecord {
    fn plant_id(&self) -> PlantId;
    fn scientific_name(&self) -> &str;
    fn common_name(&self) -> &str;
    fn family(&self) -> Option<&str>;
    fn genus(&self) -> Option<&str>;
    fn is_published(&self) -> bool;
    fn has_image(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Per-caller data some predicates need.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    /// The caller's favorite plants
    pub favorites: HashSet<PlantId>,
    /// Members of `filter.collection_id`, loaded by the caller when that field is set
    pub collection_members: Option<HashSet<PlantId>>,
}

fn eq_ignore_case(value: Option<&str>, wanted: &str) -> bool {
    value.is_some_and(|v| v.trim().to_lowercase() == wanted.to_lowercase())
}

/// Narrow `plants` by every field set in `filter`, keeping the input order.
pub fn apply_filters<T: PlantRecord>(mut plants: Vec<T>, filter: &PlantFilter, ctx: &FilterContext) -> Vec<T> {
    let filter = filter.clone().normalized();

    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        plants.retain(|p| p.common_name().to_lowercase().contains(&needle) || p.scientific_name().to_lowercase().contains(&needle));
    }

    if let Some(family) = &filter.family {
        plants.retain(|p| eq_ignore_case(p.family(), family));
    }

    if let Some(genus) = &filter.genus {
        plants.retain(|p| eq_ignore_case(p.genus(), genus));
    }

    if filter.collection_id.is_some() {
        match &ctx.collection_members {
            Some(members) => plants.retain(|p| members.contains(&p.plant_id())),
            None => plants.clear(),
        }
    }

    if filter.favorites_only == Some(true) {
        plants.retain(|p| ctx.favorites.contains(&p.plant_id()));
    }

    if let Some(has_image) = filter.has_image {
        plants.retain(|p| p.has_image() == has_image);
    }

    if let Some(published) = filter.published {
        plants.retain(|p| p.is_published() == published);
    }

    plants
}

/// Stable sort of a plant list.
pub fn sort_plants<T: PlantRecord>(plants: &mut [T], sort: PlantSort) {
    match sort {
        PlantSort::Name => plants.sort_by(|a, b| {
            a.common_name()
                .to_lowercase()
                .cmp(&b.common_name().to_lowercase())
                .then_with(|| a.scientific_name().to_lowercase().cmp(&b.scientific_name().to_lowercase()))
        }),
        PlantSort::Scientific => plants.sort_by_key(|p| p.scientific_name().to_lowercase()),
        PlantSort::Newest => plants.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
    }
}
