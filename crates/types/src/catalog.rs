//! Static deal catalog: the storefronts, categories, and deal types the bot
//! offers as menu choices. Callback tokens embed the entry id
//! (`platform_flipkart`, `category_electronics`, `dealtype_cashback`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub label: &'static str,
}

pub const PLATFORMS: &[CatalogEntry] = &[
    CatalogEntry { id: "flipkart", label: "🛒 Flipkart" },
    CatalogEntry { id: "amazon", label: "📦 Amazon" },
    CatalogEntry { id: "meesho", label: "🛍️ Meesho" },
    CatalogEntry { id: "myntra", label: "👗 Myntra" },
    CatalogEntry { id: "all", label: "🔍 All Platforms" },
];

pub const CATEGORIES: &[CatalogEntry] = &[
    CatalogEntry { id: "mobile", label: "Mobile" },
    CatalogEntry { id: "television", label: "Television" },
    CatalogEntry { id: "shirt", label: "Shirt" },
    CatalogEntry { id: "electronics", label: "Electronics" },
    CatalogEntry { id: "fashion", label: "Fashion" },
    CatalogEntry { id: "home_kitchen", label: "Home & Kitchen" },
    CatalogEntry { id: "books", label: "Books" },
    CatalogEntry { id: "sports_fitness", label: "Sports & Fitness" },
    CatalogEntry { id: "beauty_personal_care", label: "Beauty & Personal Care" },
    CatalogEntry { id: "automotive", label: "Automotive" },
];

pub const DEAL_TYPES: &[CatalogEntry] = &[
    CatalogEntry { id: "percentage", label: "💯 Percentage Discounts" },
    CatalogEntry { id: "bogo", label: "🎁 BOGO Offers" },
    CatalogEntry { id: "bank", label: "🏦 Bank Discounts" },
    CatalogEntry { id: "clearance", label: "🏷️ Clearance Sales" },
    CatalogEntry { id: "cashback", label: "💸 Cashback Offers" },
];

pub fn platform(id: &str) -> Option<&'static CatalogEntry> {
    PLATFORMS.iter().find(|entry| entry.id == id)
}

pub fn category(id: &str) -> Option<&'static CatalogEntry> {
    CATEGORIES.iter().find(|entry| entry.id == id)
}

pub fn deal_type(id: &str) -> Option<&'static CatalogEntry> {
    DEAL_TYPES.iter().find(|entry| entry.id == id)
}
