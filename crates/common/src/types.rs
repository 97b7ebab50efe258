use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default loan-to-value multiplier for a fresh configuration.
pub const DEFAULT_MULTIPLIER: f64 = 0.8;

/// Unique identifier of a collateral or borrowed asset record.
///
/// Stored as an opaque string so configurations written by older clients
/// (which used timestamp ids) still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a user-entered token symbol (trimmed, upper-case).
pub fn normalize_symbol(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A priced token quantity with no identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub price: f64,
    pub amount: f64,
}

impl Token {
    pub fn new(name: &str, price: f64, amount: f64) -> Self {
        Self {
            name: normalize_symbol(name),
            price,
            amount,
        }
    }

    /// USD value (`amount * price`).
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

/// A deposited asset backing borrowing capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAsset {
    pub id: AssetId,
    pub name: String,
    pub price: f64,
    pub amount: f64,
    /// Excluded assets are kept but ignored by every aggregate.
    pub included: bool,
}

impl CollateralAsset {
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

/// An asset drawn against the collateral. Always counted in totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowedAsset {
    pub id: AssetId,
    pub name: String,
    pub price: f64,
    pub amount: f64,
}

impl BorrowedAsset {
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

/// Pending "add collateral" form state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralDraft {
    pub name: String,
    pub price: f64,
    pub amount: f64,
    #[serde(default = "default_included")]
    pub included: bool,
}

fn default_included() -> bool {
    true
}

impl Default for CollateralDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: 0.0,
            amount: 0.0,
            included: true,
        }
    }
}

/// Editable numeric field of an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetField {
    Amount,
    Price,
}

impl std::fmt::Display for AssetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetField::Amount => write!(f, "amount"),
            AssetField::Price => write!(f, "price"),
        }
    }
}

impl std::str::FromStr for AssetField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount" => Ok(AssetField::Amount),
            "price" => Ok(AssetField::Price),
            other => Err(format!("unknown asset field '{}'", other)),
        }
    }
}

/// Which collection an asset lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Collateral,
    Borrowed,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Collateral => write!(f, "collateral"),
            AssetKind::Borrowed => write!(f, "borrowed"),
        }
    }
}

/// The whole persisted configuration of a position.
///
/// Field names follow the stored JSON layout (`borrowedAssets`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionConfig {
    pub collaterals: Vec<CollateralAsset>,
    pub borrowed_assets: Vec<BorrowedAsset>,
    /// Pending "add borrowed asset" form state.
    pub borrow: Token,
    pub multiplier: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            collaterals: Vec::new(),
            borrowed_assets: Vec::new(),
            borrow: Token::default(),
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}
