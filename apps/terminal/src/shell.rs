//! # Command Shell
//!
//! Line-oriented front end for the terminal: one command per line on stdin,
//! plain text on stdout.
//!
//! ## Event Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tokio::select! {                                                       │
//! │                                                                         │
//! │    stdin line ──► record_activity ──► Command::parse ──► execute       │
//! │                                                            │            │
//! │                                                  changed? ─┴─► save    │
//! │                                                                         │
//! │    idle tick ───► Terminal::tick_idle ──► TimedOut? ──► notice + save  │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use bodega_core::offers::OfferKind;
use bodega_core::{Money, Tender};

use crate::error::ApiResult;
use crate::terminal::{RefundSelection, Terminal};

pub const HELP: &str = "\
Commands:
  login <code> <password>         Start a session at this terminal
  logout                          End the session (the cart is kept)
  scan <barcode|code> [qty]       Add units to the cart
  qty <barcode|code> <qty>        Set a line's quantity (0 removes it)
  remove <barcode|code>           Remove a line
  clear                           Empty the cart
  cart                            Show the cart
  pay cash <amount>               Pay in cash, e.g. pay cash 20.00
  pay card                        Pay by card
  ticket <number>                 Show a past sale
  refund <ticket> <code:qty,...> <reason>
                                  Refund units of a past sale
  search <text>                   Find products
  lowstock                        Products running out
  offers                          Offers live right now
  report [YYYY-MM-DD]             Sales summary (default today)
  whoami                          Current employee and idle countdown
  help                            This list
  quit                            Log out and exit";

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command '{0}'. Type 'help' for the list.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid amount '{0}'")]
    Amount(String),

    #[error("Invalid quantity '{0}'")]
    Quantity(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    Date(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { code: String, password: String },
    Logout,
    Scan { code: String, qty: i64 },
    Quantity { code: String, qty: i64 },
    Remove { code: String },
    Clear,
    Cart,
    Pay(Tender),
    Ticket { number: String },
    Refund {
        ticket: String,
        selections: Vec<RefundSelection>,
        reason: String,
    },
    Search { query: String },
    LowStock,
    Offers,
    Report { date: Option<NaiveDate> },
    WhoAmI,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseError::Usage("help"));
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("login", [code, password]) => Command::Login {
                code: code.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(ParseError::Usage("login <code> <password>")),
            ("logout", []) => Command::Logout,
            ("scan", [code]) => Command::Scan {
                code: code.to_string(),
                qty: 1,
            },
            ("scan", [code, qty]) => Command::Scan {
                code: code.to_string(),
                qty: parse_quantity(qty)?,
            },
            ("scan", _) => return Err(ParseError::Usage("scan <barcode|code> [qty]")),
            ("qty", [code, qty]) => Command::Quantity {
                code: code.to_string(),
                qty: parse_quantity(qty)?,
            },
            ("qty", _) => return Err(ParseError::Usage("qty <barcode|code> <qty>")),
            ("remove", [code]) => Command::Remove {
                code: code.to_string(),
            },
            ("remove", _) => return Err(ParseError::Usage("remove <barcode|code>")),
            ("clear", []) => Command::Clear,
            ("cart", []) => Command::Cart,
            ("pay", ["cash", amount]) => Command::Pay(Tender::Cash {
                received: parse_amount(amount)?,
            }),
            ("pay", ["card"]) => Command::Pay(Tender::Card),
            ("pay", _) => return Err(ParseError::Usage("pay cash <amount> | pay card")),
            ("ticket", [number]) => Command::Ticket {
                number: number.to_string(),
            },
            ("ticket", _) => return Err(ParseError::Usage("ticket <number>")),
            ("refund", [ticket, selections, reason @ ..]) if !reason.is_empty() => {
                Command::Refund {
                    ticket: ticket.to_string(),
                    selections: parse_selections(selections)?,
                    reason: reason.join(" "),
                }
            }
            ("refund", _) => {
                return Err(ParseError::Usage("refund <ticket> <code:qty,...> <reason>"))
            }
            ("search", []) => return Err(ParseError::Usage("search <text>")),
            ("search", query) => Command::Search {
                query: query.join(" "),
            },
            ("lowstock", []) => Command::LowStock,
            ("offers", []) => Command::Offers,
            ("report", []) => Command::Report { date: None },
            ("report", [date]) => Command::Report {
                date: Some(
                    NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .map_err(|_| ParseError::Date(date.to_string()))?,
                ),
            },
            ("whoami", []) => Command::WhoAmI,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => return Err(ParseError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }

    /// Whether a successful run changes state worth saving.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Login { .. }
                | Command::Logout
                | Command::Scan { .. }
                | Command::Quantity { .. }
                | Command::Remove { .. }
                | Command::Clear
                | Command::Pay(_)
                | Command::Refund { .. }
        )
    }
}

fn parse_quantity(raw: &str) -> Result<i64, ParseError> {
    raw.parse()
        .map_err(|_| ParseError::Quantity(raw.to_string()))
}

/// Parses `12`, `12.5` or `12.50` (optionally prefixed `S/`) into céntimos.
pub fn parse_amount(raw: &str) -> Result<Money, ParseError> {
    let bad = || ParseError::Amount(raw.to_string());
    let text = raw.trim().trim_start_matches("S/").trim();
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || frac.len() > 2 || !digits(whole) || !digits(frac) {
        return Err(bad());
    }

    let soles: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| bad())? * 10,
        _ => frac.parse().map_err(|_| bad())?,
    };

    soles
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .map(Money::from_cents)
        .ok_or_else(bad)
}

/// `P001:2,P020:1` → selections.
fn parse_selections(raw: &str) -> Result<Vec<RefundSelection>, ParseError> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (code, qty) = part.split_once(':').unwrap_or((part, "1"));
            Ok(RefundSelection {
                product_code: code.to_string(),
                quantity: parse_quantity(qty)?,
            })
        })
        .collect()
}

// =============================================================================
// Execution
// =============================================================================

/// Runs one command and returns the text to show.
pub fn execute(terminal: &mut Terminal, command: &Command) -> ApiResult<String> {
    let config = terminal.config().clone();
    let money = |m: Money| config.format_money(m);
    let mut out = String::new();

    match command {
        Command::Login { code, password } => {
            let user = terminal.login(code, password)?;
            let _ = write!(out, "Welcome, {}.", user.name);
            if !terminal.cart().is_empty() {
                let _ = write!(out, "\n{}", render_cart(terminal));
            }
        }
        Command::Logout => {
            terminal.logout();
            out.push_str("Logged out.");
        }
        Command::Scan { code, qty } => {
            let line = terminal.scan(code, *qty)?;
            let _ = writeln!(
                out,
                "+ {} x {}  {}",
                qty,
                line.product.description,
                money(line.total)
            );
            out.push_str(&render_totals(terminal));
        }
        Command::Quantity { code, qty } => {
            terminal.set_quantity(code, *qty)?;
            out.push_str(&render_cart(terminal));
        }
        Command::Remove { code } => {
            terminal.remove_line(code)?;
            out.push_str(&render_cart(terminal));
        }
        Command::Clear => {
            terminal.clear_cart()?;
            out.push_str("Cart cleared.");
        }
        Command::Cart => out.push_str(&render_cart(terminal)),
        Command::Pay(tender) => {
            let receipt = terminal.checkout(*tender)?;
            out.push_str(&receipt.render(&config));
        }
        Command::Ticket { number } => {
            let sale = terminal.find_ticket(number)?;
            let _ = writeln!(
                out,
                "Ticket {}  {:?}  {}  {}",
                sale.ticket_number,
                sale.status,
                sale.employee_name,
                money(sale.total)
            );
            for line in &sale.lines {
                let refundable = terminal
                    .ledger()
                    .refundable_quantity(&sale.id, line.product_id());
                let _ = writeln!(
                    out,
                    "  {:<6} {:>3} x {:<28} {:>10}  (refundable {})",
                    line.product.code,
                    line.quantity,
                    line.product.description,
                    money(line.total),
                    refundable
                );
            }
        }
        Command::Refund {
            ticket,
            selections,
            reason,
        } => {
            let refund = terminal.refund(ticket, selections, reason)?;
            let _ = write!(
                out,
                "Refunded {} on ticket {}.",
                money(refund.refund_amount),
                refund.ticket_number
            );
            if let Some(sale) = terminal.ledger().sale(&refund.original_sale_id) {
                let _ = write!(out, " Sale is now {:?}.", sale.status);
            }
        }
        Command::Search { query } => {
            let products = terminal.search(query)?;
            if products.is_empty() {
                out.push_str("No products found.");
            }
            for p in products {
                let _ = writeln!(
                    out,
                    "{:<6} {:<14} {:<32} {:>10}  stock {}",
                    p.code,
                    p.barcode,
                    p.description,
                    money(p.sale_price),
                    p.stock
                );
            }
        }
        Command::LowStock => {
            let products = terminal.low_stock();
            if products.is_empty() {
                out.push_str("Stock is fine.");
            }
            for p in products {
                let _ = writeln!(out, "{:<6} {:<32} stock {}", p.code, p.description, p.stock);
            }
        }
        Command::Offers => {
            let offers = terminal.live_offers();
            if offers.is_empty() {
                out.push_str("No offers right now.");
            }
            for offer in offers {
                let rule = match &offer.kind {
                    OfferKind::BuyNPayM { pay_quantity } => {
                        format!("buy {} pay {}", offer.buy_quantity, pay_quantity)
                    }
                    OfferKind::BuyNGetMFree { free_quantity, .. } => {
                        format!("buy {} get {} free", offer.buy_quantity, free_quantity)
                    }
                };
                let _ = writeln!(
                    out,
                    "{:<32} {:<20} until {}",
                    offer.name,
                    rule,
                    offer.end_date.with_timezone(&config.utc_offset()).format("%Y-%m-%d")
                );
            }
        }
        Command::Report { date } => {
            let date = date.unwrap_or_else(|| terminal.today());
            let report = terminal.report_for(date);
            let _ = writeln!(out, "Sales on {date}");
            let _ = writeln!(out, "  Sales        {}", report.sale_count);
            let _ = writeln!(out, "  Revenue      {}", money(report.revenue));
            let _ = writeln!(out, "  Items sold   {}", report.items_sold);
            if let Some(hour) = report.peak_hour {
                let _ = writeln!(out, "  Peak hour    {hour:02}:00");
            }
            for (rank, item) in report.top_products.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {:<32} {:>4}  {}",
                    rank + 1,
                    item.product.description,
                    item.quantity,
                    money(item.revenue)
                );
            }
        }
        Command::WhoAmI => match terminal.current_user() {
            Some(user) => {
                let _ = write!(
                    out,
                    "{} ({}) at {}, {} s until auto-logout.",
                    user.name,
                    user.code,
                    config.terminal_id,
                    terminal.seconds_left()
                );
            }
            None => out.push_str("Nobody is logged in."),
        },
        Command::Help => out.push_str(HELP),
        Command::Quit => {}
    }

    Ok(out.trim_end().to_string())
}

fn render_cart(terminal: &Terminal) -> String {
    let config = terminal.config();
    let cart = terminal.cart();
    if cart.is_empty() {
        return "Cart is empty.".to_string();
    }

    let mut out = String::new();
    for line in cart.lines() {
        let _ = write!(
            out,
            "{:<6} {:>3} x {:<32} {:>10}",
            line.product.code,
            line.quantity,
            line.product.description,
            config.format_money(line.total)
        );
        if line.discount.is_positive() {
            let _ = write!(out, "  (-{})", config.format_money(line.discount));
        }
        out.push('\n');
    }
    out.push_str(&render_totals(terminal));
    out
}

fn render_totals(terminal: &Terminal) -> String {
    let config = terminal.config();
    let totals = terminal.cart().totals();
    format!(
        "Subtotal {}  Discount {}  IGV {}  Total {}  (cash {})",
        config.format_money(totals.subtotal),
        config.format_money(totals.discount),
        config.format_money(totals.igv),
        config.format_money(totals.total),
        config.format_money(totals.total_rounded)
    )
}

// =============================================================================
// Event Loop
// =============================================================================

/// Reads commands from stdin until `quit` or end of input, polling the
/// idle timeout in between.
pub async fn run_shell(mut terminal: Terminal) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut idle = tokio::time::interval(Duration::from_secs(
        terminal.config().idle_poll_interval_secs,
    ));
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);

    println!("{} | terminal {}", terminal.config().store_name, terminal.config().terminal_id);
    println!("Type 'help' for commands.");
    prompt(&terminal);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    prompt(&terminal);
                    continue;
                }
                terminal.record_activity();

                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => match execute(&mut terminal, &command) {
                        Ok(text) => {
                            println!("{text}");
                            if command.mutates() {
                                persist(&terminal).await;
                            }
                        }
                        Err(e) => println!("✗ {}", e.message),
                    },
                    Err(e) => println!("✗ {e}"),
                }
                prompt(&terminal);
            }
            _ = idle.tick() => {
                let status = terminal.tick_idle();
                if let Some(notice) = status.notice() {
                    println!();
                    println!("⚠ {notice}");
                    persist(&terminal).await;
                    prompt(&terminal);
                }
            }
        }
    }

    terminal.logout();
    persist(&terminal).await;
    terminal.shutdown().await;
    info!("Shell closed");
    Ok(())
}

async fn persist(terminal: &Terminal) {
    if let Err(e) = terminal.save().await {
        warn!(error = %e, "Could not save terminal state");
    }
}

fn prompt(terminal: &Terminal) {
    use std::io::Write as _;

    match terminal.current_user() {
        Some(user) => print!("{}> ", user.code),
        None => print!("> "),
    }
    let _ = std::io::stdout().flush();
}
