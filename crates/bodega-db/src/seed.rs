//! # Demo Data
//!
//! The neighbourhood-store dataset used by the `seed` binary and by the
//! terminal's integration tests: 20 products in 9 categories, 7 offers and
//! 3 employees (password `1234`).
//!
//! Offer windows are placed around `now` so a freshly seeded terminal always
//! has live promotions.

use chrono::{DateTime, Duration, Utc};

use bodega_core::auth::{AuthManager, NewUser};
use bodega_core::catalog::{Catalog, NewProduct};
use bodega_core::offers::{NewOffer, OfferKind, OfferRegistry};
use bodega_core::{AuthResult, CoreError, CoreResult, Money, Role, TaxRate};

/// Categories in shelf order.
pub const CATEGORIES: &[&str] = &[
    "Bebidas",
    "Lácteos",
    "Abarrotes",
    "Panadería",
    "Snacks",
    "Limpieza",
    "Cuidado Personal",
    "Conservas",
    "Dulces",
];

/// (code, barcode, description, purchase céntimos, sale céntimos, stock, category)
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64, &str)] = &[
    ("P001", "7501234567890", "Inca Kola 500ml", 120, 250, 150, "Bebidas"),
    ("P002", "7501234567891", "Chicha Morada Frugos 1L", 280, 450, 80, "Bebidas"),
    ("P003", "7501234567892", "Agua San Luis 625ml", 80, 150, 200, "Bebidas"),
    ("P004", "7501234567893", "Leche Gloria Evaporada 400g", 250, 420, 120, "Lácteos"),
    ("P005", "7501234567894", "Yogurt Gloria Fresa 1L", 450, 780, 60, "Lácteos"),
    ("P006", "7501234567895", "Arroz Costeño Extra 5kg", 850, 1490, 50, "Abarrotes"),
    ("P007", "7501234567896", "Aceite Primor 1L", 620, 950, 40, "Abarrotes"),
    ("P008", "7501234567897", "Azúcar Rubia Cartavio 1kg", 280, 450, 80, "Abarrotes"),
    ("P009", "7501234567898", "Pan Francés Unidad", 15, 30, 100, "Panadería"),
    ("P010", "7501234567899", "Pan Integral Bimbo", 320, 550, 25, "Panadería"),
    ("P011", "7501234567800", "Papas Lay's Clásicas 45g", 180, 320, 90, "Snacks"),
    ("P012", "7501234567801", "Chifles Inka Chips 100g", 250, 420, 70, "Snacks"),
    ("P013", "7501234567802", "Detergente Ariel 780g", 850, 1390, 30, "Limpieza"),
    ("P014", "7501234567803", "Papel Higiénico Suave 4 rollos", 480, 750, 45, "Limpieza"),
    ("P015", "7501234567804", "Shampoo Head & Shoulders 400ml", 1250, 1890, 20, "Cuidado Personal"),
    ("P016", "7501234567805", "Pasta Dental Colgate 75ml", 380, 650, 35, "Cuidado Personal"),
    ("P017", "7501234567806", "Atún Florida en Aceite 170g", 320, 550, 60, "Conservas"),
    ("P018", "7501234567807", "Leche Condensada Nestlé 393g", 450, 720, 40, "Conservas"),
    ("P019", "7501234567808", "Chocolate Sublime 30g", 120, 250, 80, "Dulces"),
    ("P020", "7501234567809", "Galletas Soda Field 6 pack", 280, 480, 50, "Dulces"),
];

/// (id, code, name, role)
const USERS: &[(&str, &str, &str, Role)] = &[
    ("1", "1001", "Juan Pérez", Role::Employee),
    ("2", "2001", "María García", Role::Employee),
    ("3", "9999", "Carlos Admin", Role::Admin),
];

/// Password given to every demo employee.
pub const DEMO_PASSWORD: &str = "1234";

/// Employee id recorded as the creator of the demo offers.
const OFFER_AUTHOR: &str = "3";

pub fn demo_catalog(now: DateTime<Utc>) -> CoreResult<Catalog> {
    let categories = CATEGORIES.iter().map(|c| c.to_string()).collect();
    let mut catalog = Catalog::with_products(Vec::new(), categories);

    for &(code, barcode, description, purchase, sale, stock, category) in PRODUCTS {
        catalog.add(
            NewProduct {
                code: code.to_string(),
                barcode: barcode.to_string(),
                description: description.to_string(),
                purchase_price: Money::from_cents(purchase),
                sale_price: Money::from_cents(sale),
                igv_rate: TaxRate::igv(),
                stock,
                category: category.to_string(),
            },
            now,
        )?;
    }

    Ok(catalog)
}

/// Offers keyed to products of `catalog` by code.
pub fn demo_offers(catalog: &Catalog, now: DateTime<Utc>) -> CoreResult<OfferRegistry> {
    let id = |code: &str| -> CoreResult<String> {
        catalog
            .by_code(code)
            .map(|p| p.id.clone())
            .ok_or_else(|| CoreError::ProductNotFound(code.to_string()))
    };
    let nxm = |pay: i64| OfferKind::BuyNPayM { pay_quantity: pay };
    let free = |code: &str, qty: i64| -> CoreResult<OfferKind> {
        Ok(OfferKind::BuyNGetMFree {
            free_product_id: id(code)?,
            free_quantity: qty,
        })
    };

    let offers = [
        ("Inca Kola 3x2", "Compra 3 Inca Kolas de 500ml y paga 2", nxm(2), "P001", 3),
        ("Chicha Morada 2x1", "Llévate 2 Chichas Moradas y paga solo 1", nxm(1), "P002", 2),
        (
            "Pan Francés + Galleta Gratis",
            "Compra 2 panes franceses y llévate 1 galleta Soda Field gratis",
            free("P020", 1)?,
            "P009",
            2,
        ),
        ("Papas Lay's 4x3", "Compra 4 paquetes de papas y paga 3", nxm(3), "P011", 4),
        ("Galletas Soda Field 3x2", "Compra 3 paquetes de galletas y paga 2", nxm(2), "P020", 3),
        ("Arroz Costeño 5+1", "Compra 5 bolsas de arroz y lleva 1 gratis", free("P006", 1)?, "P006", 5),
        ("Yogurt Gloria 2x1", "Compra 2 yogures y paga 1", nxm(1), "P005", 2),
    ];

    let mut registry = OfferRegistry::new();
    for (name, description, kind, trigger, buy) in offers {
        registry.add(
            NewOffer {
                name: name.to_string(),
                description: Some(description.to_string()),
                kind,
                product_ids: vec![id(trigger)?],
                buy_quantity: buy,
                is_active: true,
                start_date: now - Duration::days(1),
                end_date: now + Duration::days(150),
                created_by: OFFER_AUTHOR.to_string(),
            },
            now,
        )?;
    }

    Ok(registry)
}

/// Adds the demo employees to `auth`.
pub fn demo_users(auth: &mut AuthManager) -> AuthResult<()> {
    for &(id, code, name, role) in USERS {
        auth.add_user(NewUser {
            id: Some(id.to_string()),
            code: code.to_string(),
            name: name.to_string(),
            role,
            password: DEMO_PASSWORD.to_string(),
        })?;
    }
    Ok(())
}
