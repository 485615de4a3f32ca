//! Product listing and detail types.

use rust_decimal::Decimal;
use serde::Serialize;

use stride_core::{ProductId, VariantId};

/// A product card in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    /// Lowest effective (sale or list) price across the product's variants.
    pub min_price: Decimal,
    pub image_url: Option<String>,
}

/// One page of listing results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    /// Matching products across all pages.
    pub total: u64,
}

impl ProductPage {
    /// Number of pages at `limit` products per page.
    #[must_use]
    pub fn total_pages(&self, limit: u32) -> u64 {
        if limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(limit))
    }
}

/// A purchasable size/color combination of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDetail {
    pub id: VariantId,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub in_stock: u32,
}

impl VariantDetail {
    /// Sale price when set, otherwise the list price.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }
}

/// A product photo. Images tied to a variant show that variant's color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    pub variant_id: Option<VariantId>,
    pub is_primary: bool,
}

/// Product page: the product, its variants and its images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    /// Ordered by size, then id.
    pub variants: Vec<VariantDetail>,
    /// Primary image first.
    pub images: Vec<ProductImage>,
}

impl ProductDetail {
    /// Lowest effective price across variants; `None` without variants.
    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.variants.iter().map(VariantDetail::effective_price).min()
    }

    /// Whether any variant can be added to a cart.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.variants.iter().any(|v| v.in_stock > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn variant(id: i32, price: i64, sale_price: Option<i64>, in_stock: u32) -> VariantDetail {
        VariantDetail {
            id: VariantId::new(id),
            sku: format!("SKU-{id}"),
            size: Some("9".to_owned()),
            color: Some("Black".to_owned()),
            color_hex: None,
            price: Decimal::from(price),
            sale_price: sale_price.map(Decimal::from),
            in_stock,
        }
    }

    fn detail(variants: Vec<VariantDetail>) -> ProductDetail {
        ProductDetail {
            id: ProductId::new(1),
            name: "Gel-Kayano 31".to_owned(),
            description: String::new(),
            brand: Some("ASICS".to_owned()),
            category: None,
            gender: None,
            variants,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_min_price_uses_sale_prices() {
        let product = detail(vec![variant(1, 160, Some(120), 0), variant(2, 130, None, 4)]);
        assert_eq!(product.min_price(), Some(Decimal::from(120)));
        assert!(product.is_available());

        let empty = detail(Vec::new());
        assert_eq!(empty.min_price(), None);
        assert!(!empty.is_available());
    }

    #[test]
    fn test_detail_json_exposes_variant_ids() {
        let json = serde_json::to_value(detail(vec![variant(7, 160, Some(120), 3)])).unwrap();
        let variant = &json["variants"][0];
        assert_eq!(variant["id"], 7);
        assert_eq!(variant["salePrice"], "120");
        assert_eq!(variant["inStock"], 3);
        assert_eq!(variant["size"], "9");
        assert!(json["images"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = ProductPage {
            products: Vec::new(),
            total: 25,
        };
        assert_eq!(page.total_pages(12), 3);
        assert_eq!(page.total_pages(25), 1);
        assert_eq!(ProductPage::default().total_pages(12), 0);
    }
}
