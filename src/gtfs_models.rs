// GTFS static tables loaded into the table store.
//
// Column positions follow the standard GTFS column order. Values are kept as
// the raw strings found in the feed: lat/lon, sequences and dates are never
// converted, the store owns the column types.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Tables
// ============================================================================

/// One source column picked out of a GTFS file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub index: usize,
}

const fn col(name: &'static str, index: usize) -> Column {
    Column { name, index }
}

const ROUTE_COLUMNS: &[Column] = &[
    col("route_id", 0),
    col("agency_id", 1),
    col("route_short_name", 2),
    col("route_long_name", 3),
    col("route_type", 5),
    col("route_color", 7),
    col("route_text_color", 8),
];

const TRIP_COLUMNS: &[Column] = &[
    col("route_id", 0),
    col("service_id", 1),
    col("trip_id", 2),
    col("trip_headsign", 3),
    col("direction_id", 4),
    col("shape_id", 6),
];

const SHAPE_COLUMNS: &[Column] = &[
    col("shape_id", 0),
    col("shape_pt_lat", 1),
    col("shape_pt_lon", 2),
    col("shape_pt_sequence", 3),
];

const CALENDAR_COLUMNS: &[Column] = &[
    col("service_id", 0),
    col("monday", 1),
    col("tuesday", 2),
    col("wednesday", 3),
    col("thursday", 4),
    col("friday", 5),
    col("saturday", 6),
    col("sunday", 7),
    col("start_date", 8),
    col("end_date", 9),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GtfsTable {
    Routes,
    Trips,
    Shapes,
    Calendar,
}

impl GtfsTable {
    /// Default refresh order. Routes go first so trips mostly reference rows
    /// that already exist, but nothing enforces it.
    pub const ALL: [GtfsTable; 4] = [
        GtfsTable::Routes,
        GtfsTable::Trips,
        GtfsTable::Shapes,
        GtfsTable::Calendar,
    ];

    /// Member file inside the GTFS zip.
    pub fn file_name(self) -> &'static str {
        match self {
            GtfsTable::Routes => "routes.txt",
            GtfsTable::Trips => "trips.txt",
            GtfsTable::Shapes => "shapes.txt",
            GtfsTable::Calendar => "calendar.txt",
        }
    }

    /// Destination table in the store.
    pub fn table_name(self) -> &'static str {
        match self {
            GtfsTable::Routes => "routes",
            GtfsTable::Trips => "trips",
            GtfsTable::Shapes => "shapes",
            GtfsTable::Calendar => "calendar",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            GtfsTable::Routes => ROUTE_COLUMNS,
            GtfsTable::Trips => TRIP_COLUMNS,
            GtfsTable::Shapes => SHAPE_COLUMNS,
            GtfsTable::Calendar => CALENDAR_COLUMNS,
        }
    }

    /// First mapped column; always populated in a well-formed feed.
    pub fn key_column(self) -> &'static str {
        self.columns()[0].name
    }

    pub fn build_record(self, raw: RawRecord) -> GtfsRecord {
        match self {
            GtfsTable::Routes => GtfsRecord::Route(RouteRecord::from(raw)),
            GtfsTable::Trips => GtfsRecord::Trip(TripRecord::from(raw)),
            GtfsTable::Shapes => GtfsRecord::Shape(ShapeRecord::from(raw)),
            GtfsTable::Calendar => GtfsRecord::Calendar(CalendarRecord::from(raw)),
        }
    }
}

impl fmt::Display for GtfsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for GtfsTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GtfsTable::ALL
            .into_iter()
            .find(|table| table.table_name() == s)
            .ok_or_else(|| format!("unknown GTFS table '{}'", s))
    }
}

// ============================================================================
// Records
// ============================================================================

/// Destination field name -> raw string value for one parsed line.
/// Columns missing from a short line are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRecord(BTreeMap<String, String>);

impl RawRecord {
    pub fn from_fields<S: AsRef<str>>(fields: &[S], columns: &[Column]) -> Self {
        let mut values = BTreeMap::new();
        for column in columns {
            if let Some(value) = fields.get(column.index) {
                values.insert(column.name.to_string(), value.as_ref().to_string());
            }
        }
        RawRecord(values)
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_long_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_text_color: Option<String>,
}

impl From<RawRecord> for RouteRecord {
    fn from(mut raw: RawRecord) -> Self {
        RouteRecord {
            route_id: raw.take("route_id"),
            agency_id: raw.take("agency_id"),
            route_short_name: raw.take("route_short_name"),
            route_long_name: raw.take("route_long_name"),
            route_type: raw.take("route_type"),
            route_color: raw.take("route_color"),
            route_text_color: raw.take("route_text_color"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_headsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_id: Option<String>,
}

impl From<RawRecord> for TripRecord {
    fn from(mut raw: RawRecord) -> Self {
        TripRecord {
            route_id: raw.take("route_id"),
            service_id: raw.take("service_id"),
            trip_id: raw.take("trip_id"),
            trip_headsign: raw.take("trip_headsign"),
            direction_id: raw.take("direction_id"),
            shape_id: raw.take("shape_id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShapeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_pt_lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_pt_lon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_pt_sequence: Option<String>,
}

impl From<RawRecord> for ShapeRecord {
    fn from(mut raw: RawRecord) -> Self {
        ShapeRecord {
            shape_id: raw.take("shape_id"),
            shape_pt_lat: raw.take("shape_pt_lat"),
            shape_pt_lon: raw.take("shape_pt_lon"),
            shape_pt_sequence: raw.take("shape_pt_sequence"),
        }
    }
}

/// Weekday flags stay "0"/"1" strings and dates stay YYYYMMDD.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalendarRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thursday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl From<RawRecord> for CalendarRecord {
    fn from(mut raw: RawRecord) -> Self {
        CalendarRecord {
            service_id: raw.take("service_id"),
            monday: raw.take("monday"),
            tuesday: raw.take("tuesday"),
            wednesday: raw.take("wednesday"),
            thursday: raw.take("thursday"),
            friday: raw.take("friday"),
            saturday: raw.take("saturday"),
            sunday: raw.take("sunday"),
            start_date: raw.take("start_date"),
            end_date: raw.take("end_date"),
        }
    }
}

/// A parsed line of one of the four loaded tables. Serializes as the plain
/// row object the store expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GtfsRecord {
    Route(RouteRecord),
    Trip(TripRecord),
    Shape(ShapeRecord),
    Calendar(CalendarRecord),
}
