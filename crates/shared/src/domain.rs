use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PointId);
id_newtype!(DestinationId);
id_newtype!(OfferId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointType {
    Taxi,
    Bus,
    Train,
    Ship,
    Drive,
    Flight,
    CheckIn,
    Sightseeing,
    Restaurant,
}

impl PointType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Taxi => "Taxi",
            Self::Bus => "Bus",
            Self::Train => "Train",
            Self::Ship => "Ship",
            Self::Drive => "Drive",
            Self::Flight => "Flight",
            Self::CheckIn => "Check-in",
            Self::Sightseeing => "Sightseeing",
            Self::Restaurant => "Restaurant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: PointId,
    #[serde(rename = "type")]
    pub kind: PointType,
    pub base_price: u32,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub destination: DestinationId,
    #[serde(default)]
    pub offers: Vec<OfferId>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl RoutePoint {
    pub fn duration(&self) -> Duration {
        self.date_to - self.date_from
    }

    pub fn with_favorite(&self, is_favorite: bool) -> Self {
        Self {
            is_favorite,
            ..self.clone()
        }
    }

    pub fn to_draft(&self) -> RoutePointDraft {
        RoutePointDraft {
            kind: self.kind,
            base_price: self.base_price,
            date_from: self.date_from,
            date_to: self.date_to,
            destination: self.destination,
            offers: self.offers.clone(),
            is_favorite: self.is_favorite,
        }
    }
}

/// A route point that has not been stored yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePointDraft {
    #[serde(rename = "type")]
    pub kind: PointType,
    pub base_price: u32,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub destination: DestinationId,
    #[serde(default)]
    pub offers: Vec<OfferId>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl RoutePointDraft {
    pub fn blank(kind: PointType, destination: DestinationId, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            base_price: 0,
            date_from: at,
            date_to: at,
            destination,
            offers: Vec::new(),
            is_favorite: false,
        }
    }

    pub fn into_point(self, id: PointId) -> RoutePoint {
        RoutePoint {
            id,
            kind: self.kind,
            base_price: self.base_price,
            date_from: self.date_from,
            date_to: self.date_to,
            destination: self.destination,
            offers: self.offers,
            is_favorite: self.is_favorite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub title: String,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOffers {
    #[serde(rename = "type")]
    pub kind: PointType,
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferCatalog(pub Vec<TypeOffers>);

impl OfferCatalog {
    pub fn offers_for(&self, kind: PointType) -> &[Offer] {
        self.0
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.offers.as_slice())
            .unwrap_or_default()
    }

    /// Offers of the point's type that the point has selected, in catalog order.
    pub fn selected_for(&self, point: &RoutePoint) -> Vec<Offer> {
        self.offers_for(point.kind)
            .iter()
            .filter(|offer| point.offers.contains(&offer.id))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    pub src: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pictures: Vec<Picture>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationCatalog(pub Vec<Destination>);

impl DestinationCatalog {
    pub fn get(&self, id: DestinationId) -> Option<&Destination> {
        self.0.iter().find(|destination| destination.id == id)
    }
}

/// Formats a point duration the way the trip list shows it: `23M`, `02H 44M`, `01D 02H 30M`.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days:02}D {hours:02}H {minutes:02}M")
    } else if hours > 0 {
        format!("{hours:02}H {minutes:02}M")
    } else {
        format!("{minutes:02}M")
    }
}
