use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(MaterialType {
    Seal => "seal",
    Ring => "ring",
    Bearing => "bearing",
    Valve => "valve",
    Filter => "filter",
    Electrical => "electrical",
    Fastener => "fastener",
    Pipe => "pipe",
    Mechanical => "mechanical",
    Unknown => "unknown",
});

impl MaterialType {
    /// Every recognized type, excluding the `Unknown` sentinel.
    pub fn known() -> &'static [MaterialType] {
        &[
            Self::Seal,
            Self::Ring,
            Self::Bearing,
            Self::Valve,
            Self::Filter,
            Self::Electrical,
            Self::Fastener,
            Self::Pipe,
            Self::Mechanical,
        ]
    }

    /// Ring- and seal-like parts, where a two-number dimension is a
    /// diameter pair rather than a generic size.
    pub fn is_annular(&self) -> bool {
        matches!(self, Self::Seal | Self::Ring | Self::Bearing)
    }

    /// Lenient mapping of a free-form label (LLM output, German or English)
    /// to a recognized type. `None` for anything outside the recognized set,
    /// including "other" and "unknown".
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        let t = match lower.as_str() {
            "seal" | "seals" | "sealing" | "dichtung" | "dichtungen" | "gasket" | "o-ring"
            | "oring" => Self::Seal,
            "ring" | "rings" | "sicherungsring" | "retaining ring" => Self::Ring,
            "bearing" | "bearings" | "lager" | "kugellager" | "wälzlager" => Self::Bearing,
            "valve" | "valves" | "ventil" | "armatur" => Self::Valve,
            "filter" | "filters" | "filterelement" | "wasserfilter" => Self::Filter,
            "electrical" | "electric" | "elektrik" | "elektro" | "elektrisch" => Self::Electrical,
            "fastener" | "fasteners" | "schraube" | "befestigung" | "verbindungselement" => {
                Self::Fastener
            }
            "pipe" | "piping" | "rohr" | "rohrleitung" | "hose" | "schlauch" | "fitting" => {
                Self::Pipe
            }
            "mechanical" | "mechanik" | "mechanisch" => Self::Mechanical,
            _ => return None,
        };
        Some(t)
    }
}

str_enum!(CandidateSource {
    Rule => "rule",
    Llm => "llm",
});

str_enum!(CharacteristicKind {
    Dimension => "dimension",
    MaterialCode => "material_code",
    StandardCode => "standard_code",
    PressureRating => "pressure_rating",
    NominalSize => "nominal_size",
    Thread => "thread",
    Electrical => "electrical",
    Manufacturer => "manufacturer",
    PartNumber => "part_number",
    Quantity => "quantity",
    Other => "other",
});

impl CharacteristicKind {
    /// Rank used when picking characteristics for the short description.
    /// Lower is more salient: dimension > material > standard > the rest.
    pub fn salience(&self) -> u8 {
        match self {
            Self::Dimension => 0,
            Self::MaterialCode => 1,
            Self::StandardCode | Self::PressureRating | Self::NominalSize => 2,
            Self::Thread | Self::Electrical => 3,
            Self::Manufacturer | Self::PartNumber => 4,
            Self::Quantity | Self::Other => 5,
        }
    }
}

str_enum!(Slot {
    TypeDesignation => "type_designation",
    InnerDiameter => "inner_diameter",
    OuterDiameter => "outer_diameter",
    Height => "height",
    Size => "size",
    NominalSize => "nominal_size",
    Material => "material",
    Standard => "standard",
    PressureRating => "pressure_rating",
    Thread => "thread",
    Voltage => "voltage",
    Power => "power",
    Frequency => "frequency",
    Current => "current",
    Manufacturer => "manufacturer",
    PartNumber => "part_number",
});

impl Slot {
    /// Alternative spellings an LLM tends to use for the slot.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::TypeDesignation => &["typ", "type", "bauform", "bauart"],
            Self::InnerDiameter => &[
                "inner",
                "innen",
                "id",
                "inner diameter",
                "innendurchmesser",
                "d1",
            ],
            Self::OuterDiameter => &[
                "outer",
                "aussen",
                "außen",
                "od",
                "outer diameter",
                "außendurchmesser",
                "d2",
            ],
            Self::Height => &["height", "höhe", "hoehe", "breite", "width", "b"],
            Self::Size => &["size", "größe", "groesse", "abmessung", "abmessungen", "dimension"],
            Self::NominalSize => &["dn", "nennweite", "nominal size"],
            Self::Material => &["material", "werkstoff", "werkstoffe"],
            Self::Standard => &["din", "iso", "din/iso", "norm", "standard"],
            Self::PressureRating => &["pn", "druckstufe", "nenndruck", "pressure"],
            Self::Thread => &["gewinde", "thread", "anschluss"],
            Self::Voltage => &["spannung", "voltage", "spannung (v)"],
            Self::Power => &["leistung", "power", "leistung (kw)"],
            Self::Frequency => &["frequenz", "frequency", "frequenz (hz)"],
            Self::Current => &["strom", "current", "strom (a)"],
            Self::Manufacturer => &["hersteller", "manufacturer", "marke", "brand", "fabrikat"],
            Self::PartNumber => &[
                "referenz",
                "ref",
                "artikelnummer",
                "art.-nr.",
                "part number",
                "bestellnummer",
            ],
        }
    }
}
