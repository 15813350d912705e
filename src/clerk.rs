use anyhow::Context as _;
use chrono::{Datelike, Local, NaiveDate};
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use inquire::{Confirm, CustomType, InquireError, Select, Text};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::document::format_money;
use crate::model::{CatalogRow, ClientInfo, Discount, IssuerConfig, PriceTier};
use crate::pdf::render_pdf;
use crate::session::{GeneratedInvoice, InvoiceRequest, InvoiceSession, SessionState};

const MENU_SEARCH: &str = "🔍 Search & add item";
const MENU_TIER: &str = "💲 Change price tier";
const MENU_CART: &str = "🛒 View cart";
const MENU_GENERATE: &str = "🧾 Generate proforma invoice";
const MENU_CLEAR: &str = "🗑  Clear items";
const MENU_QUIT: &str = "🚪 Quit";

const DISCOUNT_NONE: &str = "No discount";
const DISCOUNT_PCT: &str = "Percentage (%)";
const DISCOUNT_FIXED: &str = "Fixed amount";

/// The interactive add-items -> generate loop for one clerk.
pub struct Clerk<'a> {
    catalog: &'a Catalog,
    issuer: &'a IssuerConfig,
    root: &'a Path,
    logo: Option<Vec<u8>>,
    session: InvoiceSession,
    tier: PriceTier,
    last_client: ClientInfo,
}

impl<'a> Clerk<'a> {
    pub fn new(catalog: &'a Catalog, issuer: &'a IssuerConfig, root: &'a Path, logo: Option<Vec<u8>>) -> Self {
        Self {
            catalog,
            issuer,
            root,
            logo,
            session: InvoiceSession::new(),
            tier: PriceTier::Detail,
            last_client: ClientInfo::default(),
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        println!("\n--- Proforma Invoice ({} items in catalog) ---", self.catalog.len());
        if self.choose_tier().is_err() {
            println!("Using {}", self.tier);
        }

        loop {
            let cart = self.session.items().len();
            let options = vec![
                MENU_SEARCH.to_string(),
                format!("{} (current: {})", MENU_TIER, self.tier),
                format!("{} ({} item(s))", MENU_CART, cart),
                format!("{} (N° {})", MENU_GENERATE, self.session.next_transaction_number()),
                MENU_CLEAR.to_string(),
                MENU_QUIT.to_string(),
            ];

            let choice = match Select::new("What next?", options).raw_prompt() {
                Ok(choice) => choice.index,
                Err(_) => break,
            };

            let outcome = match choice {
                0 => self.search_and_add(),
                1 => self.choose_tier(),
                2 => {
                    self.show_cart();
                    Ok(())
                }
                3 => self.generate(),
                4 => {
                    self.session.clear();
                    println!("✅ Items cleared!");
                    Ok(())
                }
                _ => break,
            };

            if let Err(e) = outcome {
                match e.downcast_ref::<InquireError>() {
                    Some(InquireError::OperationCanceled) | Some(InquireError::OperationInterrupted) => {
                        println!("Cancelled");
                    }
                    _ => {
                        error!(error = %e, "action failed");
                        println!("❌ {:#}", e);
                    }
                }
            }
        }

        println!("👋 Bye.");
        Ok(())
    }

    fn choose_tier(&mut self) -> anyhow::Result<()> {
        let start = PriceTier::ALL.iter().position(|t| *t == self.tier).unwrap_or(0);
        self.tier = Select::new("Select price type:", PriceTier::ALL.to_vec())
            .with_starting_cursor(start)
            .prompt()?;
        Ok(())
    }

    fn search_and_add(&mut self) -> anyhow::Result<()> {
        let term = Text::new("Search for an item by name:").prompt()?;
        if term.trim().is_empty() {
            return Ok(());
        }

        let catalog = self.catalog;
        let matches: Vec<&CatalogRow> = catalog.search(term.trim());
        if matches.is_empty() {
            println!("❌ No item matches \"{}\".", term.trim());
            return Ok(());
        }
        println!("{}", catalog_table(catalog, &matches));

        let options: Vec<String> = matches
            .iter()
            .map(|row| match catalog.price(row, self.tier) {
                Ok(price) => format!("{}  ({})", row.name, format_money(price)),
                Err(_) => format!("{}  (no {})", row.name, self.tier),
            })
            .collect();
        let picked = Select::new("Select an item:", options).raw_prompt()?;
        let row = matches[picked.index];

        let quantity = CustomType::<u32>::new("Quantity:")
            .with_default(1)
            .with_error_message("Enter a whole number of at least 1")
            .with_validator(|q: &u32| {
                Ok(if *q >= 1 {
                    inquire::validator::Validation::Valid
                } else {
                    inquire::validator::Validation::Invalid("Quantity must be at least 1".into())
                })
            })
            .prompt()?;

        let item = self
            .session
            .add_from_catalog(catalog, row, self.tier, quantity)?;
        println!(
            "✅ Item added! {} x {} @ {} {}",
            item.quantity,
            item.name,
            format_money(item.unit_price),
            self.issuer.currency
        );
        Ok(())
    }

    fn show_cart(&self) {
        let items = self.session.items();
        if items.is_empty() {
            println!("(Cart is empty)");
            return;
        }

        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("#"),
            Cell::new("Item"),
            Cell::new("Qty"),
            Cell::new("Unit price"),
            Cell::new("Line total"),
        ]);
        let mut subtotal = Decimal::ZERO;
        for (i, item) in items.iter().enumerate() {
            subtotal += item.line_total();
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&item.name),
                Cell::new(item.quantity).set_alignment(CellAlignment::Right),
                Cell::new(format_money(item.unit_price)).set_alignment(CellAlignment::Right),
                Cell::new(format_money(item.line_total())).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new(""),
            Cell::new("Subtotal").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{} {}", format_money(subtotal), self.issuer.currency))
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

        println!("\n--- Selected Items ---");
        println!("{table}");
    }

    fn generate(&mut self) -> anyhow::Result<()> {
        match self.session.state() {
            SessionState::Building => {}
            SessionState::Empty => {
                println!("❌ No items selected yet.");
                return Ok(());
            }
            SessionState::Finalized => {
                println!("❌ This cart is already invoiced. Add items to start a new one.");
                return Ok(());
            }
        }
        self.show_cart();

        println!("\n--- Client Information ---");
        let prev = &self.last_client;
        let client = ClientInfo {
            client_name: Text::new("Client name:").with_initial_value(&prev.client_name).prompt()?,
            company_name: Text::new("Company name:").with_initial_value(&prev.company_name).prompt()?,
            address: Text::new("Address:").with_initial_value(&prev.address).prompt()?,
            phone: Text::new("Phone:").with_initial_value(&prev.phone).prompt()?,
        };
        let client_id = Text::new("Client ID (Optional, press Enter to derive from company):").prompt()?;
        let discount = ask_for_discount(&self.issuer.currency)?;
        let tax_enabled = Confirm::new("Apply TVA (19%)?").with_default(true).prompt()?;

        self.last_client = client.clone();
        let request = InvoiceRequest {
            client,
            client_id,
            discount,
            tax_enabled,
        };

        let (invoice, path) = publish_invoice(
            &mut self.session,
            &request,
            self.issuer,
            Local::now().date_naive(),
            self.root,
            self.logo.as_deref(),
        )?;

        print_totals(&invoice, &self.issuer.currency);
        println!("✅ Proforma Invoice Generated: {}", path.display());
        open_and_reveal(&path);
        Ok(())
    }
}

fn ask_for_discount(currency: &str) -> anyhow::Result<Discount> {
    let mode = Select::new("Discount:", vec![DISCOUNT_NONE, DISCOUNT_PCT, DISCOUNT_FIXED]).prompt()?;
    if mode == DISCOUNT_NONE {
        return Ok(Discount::default());
    }

    let prompt = if mode == DISCOUNT_PCT {
        "Discount (%):".to_string()
    } else {
        format!("Discount ({}):", currency)
    };
    let value = CustomType::<Decimal>::new(&prompt)
        .with_error_message("Enter a number, e.g. 10 or 2500.50")
        .prompt()?;

    Ok(if mode == DISCOUNT_PCT {
        Discount::Percentage(value)
    } else {
        Discount::Fixed(value)
    })
}

pub fn catalog_table(catalog: &Catalog, rows: &[&CatalogRow]) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Item")];
    header.extend(PriceTier::ALL.iter().map(|t| Cell::new(catalog.tier_column(*t))));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![Cell::new(&row.name)];
        cells.extend(row.prices.iter().map(|p| {
            let text = p.map(format_money).unwrap_or_else(|| "-".to_string());
            Cell::new(text).set_alignment(CellAlignment::Right)
        }));
        table.add_row(cells);
    }
    table
}

fn print_totals(invoice: &GeneratedInvoice, currency: &str) {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(format!(
            "Transaction {} ({} line(s))",
            invoice.transaction.transaction_number,
            invoice.items.len()
        )),
        Cell::new(currency),
    ]);
    for (label, value) in &invoice.document.totals {
        table.add_row(vec![Cell::new(label), Cell::new(value).set_alignment(CellAlignment::Right)]);
    }
    println!("{table}");
}

/// Renders and writes the invoice, committing it to the session only once the
/// file is on disk. On failure the cart stays open and the number unused.
pub fn publish_invoice(
    session: &mut InvoiceSession,
    request: &InvoiceRequest,
    issuer: &IssuerConfig,
    today: NaiveDate,
    root: &Path,
    logo: Option<&[u8]>,
) -> anyhow::Result<(GeneratedInvoice, PathBuf)> {
    let invoice = session.prepare(request, issuer, today)?;
    let bytes = render_pdf(&invoice.document, logo)?;
    let path = write_invoice(root, &invoice, &bytes)?;
    session.commit(&invoice)?;
    Ok((invoice, path))
}

/// Writes the PDF under `output/<year>/<client_id>/` without overwriting an
/// earlier run's file of the same number.
pub fn write_invoice(root: &Path, invoice: &GeneratedInvoice, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    let tx = &invoice.transaction;
    let output_dir = root
        .join("output")
        .join(tx.transaction_date.year().to_string())
        .join(&tx.client_id);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let stem = format!("PF{}_{}", tx.transaction_number, tx.transaction_date.format("%Y%m%d"));
    let mut path = output_dir.join(format!("{}.pdf", stem));
    let mut n = 2;
    while path.exists() {
        path = output_dir.join(format!("{}-{}.pdf", stem, n));
        n += 1;
    }

    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "invoice written");
    Ok(path)
}

// Helper: Open file and reveal in Finder/Explorer
pub fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    std::process::Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    std::process::Command::new("xdg-open").arg(path).spawn().ok();
}
