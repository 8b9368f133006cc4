//! End-to-end terminal flows against the demo store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use bodega_core::{AuthSettings, Clock, IdleStatus, ManualClock, Money, SaleStatus, Tender};
use bodega_db::seed::{demo_catalog, demo_offers, demo_users, DEMO_PASSWORD};
use bodega_db::{Database, DbConfig};
use bodega_terminal::config::TerminalConfig;
use bodega_terminal::error::ErrorCode;
use bodega_terminal::terminal::{RefundSelection, Terminal};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 14, 0, 0).unwrap())
}

fn config(terminal_id: &str) -> TerminalConfig {
    TerminalConfig {
        terminal_id: terminal_id.to_string(),
        ..TerminalConfig::default()
    }
}

fn bare_terminal(clock: &ManualClock, terminal_id: &str) -> Terminal {
    Terminal::with_auth_settings(
        config(terminal_id),
        AuthSettings::low_cost(),
        Arc::new(clock.clone()),
    )
}

fn demo_terminal(clock: &ManualClock, terminal_id: &str) -> Terminal {
    let catalog = demo_catalog(clock.now()).unwrap();
    let offers = demo_offers(&catalog, clock.now()).unwrap();
    let mut terminal = bare_terminal(clock, terminal_id).with_stores(catalog, offers);
    demo_users(terminal.auth_mut()).unwrap();
    terminal
}

fn stock(terminal: &Terminal, code: &str) -> i64 {
    terminal
        .catalog()
        .with_catalog(|c| c.by_code(code).map(|p| p.stock))
        .unwrap()
}

fn select(code: &str, quantity: i64) -> RefundSelection {
    RefundSelection {
        product_code: code.to_string(),
        quantity,
    }
}

#[test]
fn test_sale_and_refunds_move_stock_and_status() {
    let clock = clock();
    let mut terminal = demo_terminal(&clock, "CAJA-01");
    terminal.login("1001", DEMO_PASSWORD).unwrap();

    // Inca Kola 3x2: 3 × 2.50, one free.
    terminal.scan("7501234567890", 3).unwrap();
    let totals = terminal.cart().totals();
    assert_eq!(totals.subtotal, Money::from_cents(750));
    assert_eq!(totals.discount, Money::from_cents(250));
    assert_eq!(totals.igv, Money::from_cents(90));
    assert_eq!(totals.total, Money::from_cents(590));

    let receipt = terminal
        .checkout(Tender::Cash {
            received: Money::from_cents(1000),
        })
        .unwrap();
    assert_eq!(receipt.settlement.charged, Money::from_cents(590));
    assert_eq!(receipt.settlement.change, Money::from_cents(410));
    assert!(terminal.cart().is_empty());
    assert_eq!(stock(&terminal, "P001"), 147);

    let ticket = receipt.ticket_number().to_string();
    let sale = terminal.find_ticket(&ticket).unwrap();
    assert_eq!(sale.status, SaleStatus::Completed);
    assert_eq!(sale.total, Money::from_cents(590));

    // One unit back: 2.50 less a third of the 2.50 discount (0.83).
    clock.advance_secs(60);
    let refund = terminal
        .refund(&ticket, &[select("P001", 1)], "Botella dañada")
        .unwrap();
    assert_eq!(refund.refund_amount, Money::from_cents(167));
    assert_eq!(stock(&terminal, "P001"), 148);
    assert_eq!(
        terminal.find_ticket(&ticket).unwrap().status,
        SaleStatus::PartialRefund
    );

    // Asking for more than is left is refused and changes nothing.
    let err = terminal
        .refund(&ticket, &[select("P001", 3)], "Cliente cambió de opinión")
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BusinessLogic);
    assert_eq!(stock(&terminal, "P001"), 148);

    let refund = terminal
        .refund(&ticket, &[select("P001", 2)], "Cliente cambió de opinión")
        .unwrap();
    assert_eq!(refund.refund_amount, Money::from_cents(333));
    assert_eq!(stock(&terminal, "P001"), 150);
    assert_eq!(
        terminal.find_ticket(&ticket).unwrap().status,
        SaleStatus::Refunded
    );

    let err = terminal
        .refund(&ticket, &[select("P001", 1)], "Otra vez")
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BusinessLogic);
}

#[test]
fn test_free_item_leaves_the_shelf() {
    let clock = clock();
    let mut terminal = demo_terminal(&clock, "CAJA-01");
    terminal.login("2001", DEMO_PASSWORD).unwrap();

    // Two Pan Francés earn one Galleta Soda Field.
    terminal.scan("P009", 2).unwrap();
    let lines = terminal.cart().lines().to_vec();
    assert_eq!(lines.len(), 2);
    let galleta = lines.iter().find(|l| l.product.code == "P020").unwrap();
    assert!(galleta.promotional);
    assert_eq!(galleta.total, Money::zero());

    let receipt = terminal.checkout(Tender::Card).unwrap();
    // 0.60 + 18% IGV, charged to the céntimo.
    assert_eq!(receipt.settlement.charged, Money::from_cents(71));
    assert_eq!(stock(&terminal, "P009"), 98);
    assert_eq!(stock(&terminal, "P020"), 49);
}

#[test]
fn test_idle_timeout_parks_the_cart() {
    let clock = clock();
    let mut terminal = demo_terminal(&clock, "CAJA-01");
    terminal.login("1001", DEMO_PASSWORD).unwrap();
    terminal.scan("P003", 2).unwrap();

    clock.advance_secs(1199);
    assert_eq!(
        terminal.tick_idle(),
        IdleStatus::Active { seconds_left: 1 }
    );

    clock.advance_secs(1);
    let status = terminal.tick_idle();
    assert!(matches!(status, IdleStatus::TimedOut { .. }));
    assert_eq!(status.notice(), Some("Session closed due to inactivity"));
    assert!(terminal.current_user().is_none());
    assert!(terminal.cart().is_empty());

    let err = terminal.scan("P003", 1).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotLoggedIn);

    terminal.login("1001", DEMO_PASSWORD).unwrap();
    assert_eq!(terminal.cart().lines().len(), 1);
    assert_eq!(terminal.cart().lines()[0].quantity, 2);
}

#[test]
fn test_activity_resets_the_countdown() {
    let clock = clock();
    let mut terminal = demo_terminal(&clock, "CAJA-01");
    terminal.login("1001", DEMO_PASSWORD).unwrap();

    clock.advance_secs(1000);
    terminal.scan("P003", 1).unwrap();
    clock.advance_secs(1000);

    assert_eq!(terminal.seconds_left(), 200);
    assert!(matches!(terminal.tick_idle(), IdleStatus::Active { .. }));
}

#[test]
fn test_switching_employees_keeps_each_cart() {
    let clock = clock();
    let mut terminal = demo_terminal(&clock, "CAJA-01");

    terminal.login("1001", DEMO_PASSWORD).unwrap();
    terminal.scan("P001", 3).unwrap();
    let juans_lines = terminal.cart().lines().to_vec();
    terminal.logout();

    terminal.login("2001", DEMO_PASSWORD).unwrap();
    assert!(terminal.cart().is_empty());
    terminal.scan("P005", 1).unwrap();
    terminal.logout();

    terminal.login("1001", DEMO_PASSWORD).unwrap();
    assert_eq!(terminal.cart().lines(), juans_lines.as_slice());
}

#[tokio::test]
async fn test_second_terminal_sees_session_conflict() {
    let clock = clock();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let mut first = demo_terminal(&clock, "CAJA-01").with_database(db.clone());
    first.login("1001", DEMO_PASSWORD).unwrap();
    first.save().await.unwrap();

    let mut second = bare_terminal(&clock, "CAJA-02").with_database(db.clone());
    second.load().await;
    assert!(second.current_user().is_none());

    let err = second.login("1001", DEMO_PASSWORD).unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionConflict);
    assert!(err.message.contains("CAJA-01"));

    let user = second.login("2001", DEMO_PASSWORD).unwrap();
    assert_eq!(user.name, "María García");
}

#[tokio::test]
async fn test_stale_session_does_not_block_other_terminal() {
    let clock = clock();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let mut first = demo_terminal(&clock, "CAJA-01").with_database(db.clone());
    first.login("1001", DEMO_PASSWORD).unwrap();
    first.save().await.unwrap();

    clock.advance_secs(1200);

    let mut second = bare_terminal(&clock, "CAJA-02").with_database(db);
    second.load().await;
    assert!(second.login("1001", DEMO_PASSWORD).is_ok());

    let open: Vec<&str> = second
        .auth()
        .sessions()
        .iter()
        .filter(|s| s.is_active)
        .map(|s| s.terminal_id.as_str())
        .collect();
    assert_eq!(open, vec!["CAJA-02"]);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let clock = clock();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let mut before = demo_terminal(&clock, "CAJA-01").with_database(db.clone());
    before.login("1001", DEMO_PASSWORD).unwrap();
    before.scan("P001", 3).unwrap();
    before.save().await.unwrap();
    drop(before);

    let mut after = bare_terminal(&clock, "CAJA-01").with_database(db.clone());
    after.load().await;
    assert_eq!(after.current_user().unwrap().code, "1001");
    assert_eq!(after.cart().lines().len(), 1);
    assert_eq!(after.cart().totals().discount, Money::from_cents(250));
    assert_eq!(after.live_offers().len(), 7);

    let receipt = after.checkout(Tender::Card).unwrap();
    after.save().await.unwrap();

    let mut later = bare_terminal(&clock, "CAJA-01").with_database(db);
    later.load().await;
    assert!(later.find_ticket(receipt.ticket_number()).is_ok());
    assert_eq!(stock(&later, "P001"), 147);
}
