#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Street crime record types and the police.uk category taxonomy.
//!
//! [`StreetCrime`] mirrors a single element of the `crimes-street` API
//! response verbatim. [`CrimePoint`] is the reduced, coordinate-parsed form
//! that the clustering index and the map view work with.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Crime categories published by the police.uk street-level crime API.
///
/// [`CrimeCategory::AllCrime`] is only meaningful as a request filter; the
/// records themselves always carry one of the concrete categories.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CrimeCategory {
    /// Every category (request filter only)
    #[default]
    AllCrime,
    /// Personal, environmental and nuisance anti-social behaviour
    AntiSocialBehaviour,
    /// Theft of a bicycle
    BicycleTheft,
    /// Unlawful entry to a house, shop, etc.
    Burglary,
    /// Damage to buildings and vehicles, deliberate fires
    CriminalDamageArson,
    /// Possession, supply and production of drugs
    Drugs,
    /// Theft by an employee, blackmail, making off without payment
    OtherTheft,
    /// Possession of a weapon such as a firearm or knife
    PossessionOfWeapons,
    /// Offences causing fear, alarm or distress
    PublicOrder,
    /// Taking property by force or threat
    Robbery,
    /// Theft from shops or stalls
    Shoplifting,
    /// Pickpocketing and snatch theft
    TheftFromThePerson,
    /// Theft from or of a vehicle, or interference with a vehicle
    VehicleCrime,
    /// Violence against the person and sexual offences
    ViolentCrime,
    /// Crimes not covered by other categories
    OtherCrime,
}

impl CrimeCategory {
    /// Returns a human-readable label for this category.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllCrime => "All crime",
            Self::AntiSocialBehaviour => "Anti-social behaviour",
            Self::BicycleTheft => "Bicycle theft",
            Self::Burglary => "Burglary",
            Self::CriminalDamageArson => "Criminal damage and arson",
            Self::Drugs => "Drugs",
            Self::OtherTheft => "Other theft",
            Self::PossessionOfWeapons => "Possession of weapons",
            Self::PublicOrder => "Public order",
            Self::Robbery => "Robbery",
            Self::Shoplifting => "Shoplifting",
            Self::TheftFromThePerson => "Theft from the person",
            Self::VehicleCrime => "Vehicle crime",
            Self::ViolentCrime => "Violence and sexual offences",
            Self::OtherCrime => "Other crime",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AllCrime,
            Self::AntiSocialBehaviour,
            Self::BicycleTheft,
            Self::Burglary,
            Self::CriminalDamageArson,
            Self::Drugs,
            Self::OtherTheft,
            Self::PossessionOfWeapons,
            Self::PublicOrder,
            Self::Robbery,
            Self::Shoplifting,
            Self::TheftFromThePerson,
            Self::VehicleCrime,
            Self::ViolentCrime,
            Self::OtherCrime,
        ]
    }
}

/// The street a crime was snapped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Street {
    /// police.uk street identifier.
    pub id: i64,
    /// Approximate street description, e.g. `"On or near Parking Area"`.
    pub name: String,
}

/// Anonymised location of a crime.
///
/// The API transmits coordinates as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude as sent by the API.
    pub latitude: String,
    /// Longitude as sent by the API.
    pub longitude: String,
    /// Street the location was snapped to.
    pub street: Street,
}

/// Latest recorded outcome for a crime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeStatus {
    /// Outcome description.
    pub category: String,
    /// Month of the outcome (`YYYY-MM`).
    pub date: String,
}

/// A single street-level crime, exactly as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetCrime {
    /// police.uk crime identifier.
    pub id: i64,
    /// Category label, verbatim (e.g. `"burglary"`).
    pub category: String,
    /// 64-character persistent identifier; empty for anti-social behaviour.
    #[serde(default)]
    pub persistent_id: String,
    /// Month of the crime (`YYYY-MM`).
    pub month: String,
    /// Anonymised location.
    pub location: Location,
    /// `"Force"` or `"BTP"`.
    #[serde(default)]
    pub location_type: Option<String>,
    /// Location subtype for British Transport Police records.
    #[serde(default)]
    pub location_subtype: Option<String>,
    /// Extra context supplied by the force.
    #[serde(default)]
    pub context: Option<String>,
    /// Latest outcome, if any.
    #[serde(default)]
    pub outcome_status: Option<OutcomeStatus>,
}

impl StreetCrime {
    /// Parses the verbatim category label into a [`CrimeCategory`].
    ///
    /// Returns `None` for labels outside the known taxonomy.
    #[must_use]
    pub fn known_category(&self) -> Option<CrimeCategory> {
        self.category.parse().ok()
    }
}

/// A crime reduced to what the map needs: identity, category and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimePoint {
    /// police.uk crime identifier.
    pub crime_id: i64,
    /// Category label, verbatim.
    pub category: String,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

/// Error returned when a [`StreetCrime`] carries coordinates that cannot be
/// turned into a [`CrimePoint`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("crime {crime_id} has invalid {axis} {value:?}")]
pub struct InvalidCoordinateError {
    /// Identifier of the offending crime.
    pub crime_id: i64,
    /// `"latitude"` or `"longitude"`.
    pub axis: &'static str,
    /// The raw value that failed to parse.
    pub value: String,
}

fn parse_coordinate(
    crime_id: i64,
    axis: &'static str,
    raw: &str,
    limit: f64,
) -> Result<f64, InvalidCoordinateError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .ok_or_else(|| InvalidCoordinateError {
            crime_id,
            axis,
            value: raw.to_string(),
        })
}

impl TryFrom<&StreetCrime> for CrimePoint {
    type Error = InvalidCoordinateError;

    fn try_from(crime: &StreetCrime) -> Result<Self, Self::Error> {
        let latitude = parse_coordinate(crime.id, "latitude", &crime.location.latitude, 90.0)?;
        let longitude = parse_coordinate(crime.id, "longitude", &crime.location.longitude, 180.0)?;

        Ok(Self {
            crime_id: crime.id,
            category: crime.category.clone(),
            longitude,
            latitude,
        })
    }
}
