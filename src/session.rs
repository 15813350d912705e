//! One clerk's invoice session: the cart and the transaction counter.

use chrono::NaiveDate;
use slug::slugify;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::document::{DocumentInput, ProformaDocument, build_document};
use crate::error::{InvoiceError, Result};
use crate::model::{
    CatalogRow, ClientInfo, Discount, InvoiceTotals, IssuerConfig, LineItem, PriceTier,
    TransactionInfo,
};
use crate::totals::compute_totals;

pub const FIRST_TRANSACTION_NUMBER: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Building,
    Finalized,
}

/// What the clerk fills in at generate time.
#[derive(Debug, Clone, Default)]
pub struct InvoiceRequest {
    pub client: ClientInfo,
    /// Blank means "derive from the company name".
    pub client_id: String,
    pub discount: Discount,
    pub tax_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedInvoice {
    pub transaction: TransactionInfo,
    pub items: Vec<LineItem>,
    pub totals: InvoiceTotals,
    pub document: ProformaDocument,
}

#[derive(Debug)]
pub struct InvoiceSession {
    items: Vec<LineItem>,
    state: SessionState,
    next_transaction: u64,
}

impl Default for InvoiceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceSession {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            state: SessionState::Empty,
            next_transaction: FIRST_TRANSACTION_NUMBER,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Number the next successful `generate` will use.
    pub fn next_transaction_number(&self) -> u64 {
        self.next_transaction
    }

    pub fn add_item(&mut self, item: LineItem) {
        if self.state == SessionState::Finalized {
            // The invoiced cart is done with; start a new one.
            self.items.clear();
        }
        debug!(name = %item.name, quantity = item.quantity, unit_price = %item.unit_price, "item added");
        self.items.push(item);
        self.state = SessionState::Building;
    }

    /// Adds `row` priced at `tier`. Nothing is added when the tier has no
    /// price for that row.
    pub fn add_from_catalog(
        &mut self,
        catalog: &Catalog,
        row: &CatalogRow,
        tier: PriceTier,
        quantity: u32,
    ) -> Result<&LineItem> {
        let unit_price = catalog.price(row, tier)?;
        let item = LineItem::new(row.name.clone(), quantity, unit_price)?;
        self.add_item(item);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.state = SessionState::Empty;
    }

    /// Validates the request and assembles the invoice under the next
    /// transaction number. The session is not changed.
    pub fn prepare(
        &self,
        request: &InvoiceRequest,
        issuer: &IssuerConfig,
        today: NaiveDate,
    ) -> Result<GeneratedInvoice> {
        self.ensure_building()?;

        let missing = request.client.missing_fields();
        if !missing.is_empty() {
            return Err(InvoiceError::ValidationFailure(format!(
                "Missing client information: {}",
                missing.join(", ")
            )));
        }

        if request.discount.value().is_sign_negative() {
            return Err(InvoiceError::ValidationFailure(
                "Discount cannot be negative".to_string(),
            ));
        }

        // Used as a folder name, so always slugged.
        let client_id = if request.client_id.trim().is_empty() {
            slugify(request.client.company_name.trim())
        } else {
            slugify(request.client_id.trim())
        };
        if client_id.is_empty() {
            return Err(InvoiceError::ValidationFailure(
                "Client ID needs at least one letter or digit".to_string(),
            ));
        }

        let transaction = TransactionInfo {
            transaction_number: self.next_transaction,
            transaction_date: today,
            client_id,
        };

        let totals = compute_totals(&self.items, request.discount, request.tax_enabled);
        let document = build_document(&DocumentInput {
            issuer,
            client: &request.client,
            transaction: &transaction,
            items: &self.items,
            totals: &totals,
            discount: request.discount,
            tax_enabled: request.tax_enabled,
        })?;

        Ok(GeneratedInvoice {
            transaction,
            items: self.items.clone(),
            totals,
            document,
        })
    }

    /// Consumes the transaction number of a prepared invoice and finalizes
    /// the cart.
    pub fn commit(&mut self, invoice: &GeneratedInvoice) -> Result<()> {
        self.ensure_building()?;
        if invoice.transaction.transaction_number != self.next_transaction {
            return Err(InvoiceError::ValidationFailure(format!(
                "Invoice N° {} was prepared for another cart",
                invoice.transaction.transaction_number
            )));
        }

        self.next_transaction += 1;
        self.state = SessionState::Finalized;

        info!(
            transaction = invoice.transaction.transaction_number,
            client_id = %invoice.transaction.client_id,
            items = invoice.items.len(),
            grand_total = %invoice.totals.grand_total,
            "proforma generated"
        );
        Ok(())
    }

    fn ensure_building(&self) -> Result<()> {
        match self.state {
            SessionState::Building => Ok(()),
            _ => Err(InvoiceError::ValidationFailure(
                "Add at least one item before generating an invoice".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLayout;
    use rust_decimal::Decimal;

    const DEFAULT_ISSUER: &str = include_str!("../issuer.toml");

    fn issuer() -> IssuerConfig {
        toml::from_str(DEFAULT_ISSUER).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            client: ClientInfo {
                client_name: "Karim Benali".into(),
                company_name: "Atelier du Bois".into(),
                address: "5 Boulevard de l'ALN".into(),
                phone: "0661 11 22 33".into(),
            },
            client_id: String::new(),
            discount: Discount::Percentage(Decimal::TEN),
            tax_enabled: true,
        }
    }

    impl InvoiceSession {
        /// Prepare and commit in one step, for callers with nothing to publish.
        pub(crate) fn generate(
            &mut self,
            request: &InvoiceRequest,
            issuer: &IssuerConfig,
            today: NaiveDate,
        ) -> Result<GeneratedInvoice> {
            let invoice = self.prepare(request, issuer, today)?;
            self.commit(&invoice)?;
            Ok(invoice)
        }
    }

    fn chair() -> LineItem {
        LineItem::new("Chaise", 2, Decimal::from(500)).unwrap()
    }

    #[test]
    fn starts_empty_and_builds() {
        let mut session = InvoiceSession::new();
        assert_eq!(session.state(), SessionState::Empty);
        session.add_item(chair());
        assert_eq!(session.state(), SessionState::Building);
        assert_eq!(session.items().len(), 1);
    }

    #[test]
    fn clear_returns_to_empty() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());
        session.clear();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.items().is_empty());
    }

    #[test]
    fn generate_computes_totals_and_finalizes() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());
        let invoice = session.generate(&request(), &issuer(), today()).unwrap();

        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(invoice.transaction.transaction_number, 1000);
        assert_eq!(invoice.transaction.client_id, "atelier-du-bois");
        assert_eq!(invoice.totals.subtotal_after_discount, Decimal::from(900));
        assert_eq!(invoice.totals.grand_total, Decimal::new(107100, 2));
    }

    #[test]
    fn incomplete_client_is_rejected_without_side_effects() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());

        for field in 0..4 {
            let mut req = request();
            match field {
                0 => req.client.client_name.clear(),
                1 => req.client.company_name.clear(),
                2 => req.client.address.clear(),
                _ => req.client.phone.clear(),
            }
            let err = session.generate(&req, &issuer(), today()).unwrap_err();
            assert!(matches!(err, InvoiceError::ValidationFailure(_)));
            assert_eq!(session.state(), SessionState::Building);
            assert_eq!(session.next_transaction_number(), FIRST_TRANSACTION_NUMBER);
        }
    }

    #[test]
    fn transaction_numbers_increase_by_one() {
        let mut session = InvoiceSession::new();
        let mut numbers = Vec::new();
        for _ in 0..3 {
            session.add_item(chair());
            let invoice = session.generate(&request(), &issuer(), today()).unwrap();
            numbers.push(invoice.transaction.transaction_number);
        }
        assert_eq!(numbers, vec![1000, 1001, 1002]);
    }

    #[test]
    fn adding_after_generate_starts_a_new_cart() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());
        session.add_item(chair());
        session.generate(&request(), &issuer(), today()).unwrap();

        session.add_item(chair());
        assert_eq!(session.state(), SessionState::Building);
        assert_eq!(session.items().len(), 1);
    }

    #[test]
    fn generate_needs_items() {
        let mut session = InvoiceSession::new();
        assert!(session.generate(&request(), &issuer(), today()).is_err());

        session.add_item(chair());
        session.generate(&request(), &issuer(), today()).unwrap();
        // Already invoiced; nothing new to generate.
        assert!(session.generate(&request(), &issuer(), today()).is_err());
        assert_eq!(session.next_transaction_number(), 1001);
    }

    #[test]
    fn negative_discount_is_rejected() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());
        let mut req = request();
        req.discount = Discount::Fixed(Decimal::from(-5));
        assert!(session.generate(&req, &issuer(), today()).is_err());
    }

    #[test]
    fn missing_tier_adds_nothing() {
        let csv = "Denomination,prix-super-gros,prix-gros,prix-detaille\nBanc,100,,150\n";
        let catalog = Catalog::from_csv(csv.as_bytes(), &CatalogLayout::default()).unwrap();
        let row = catalog.rows()[0].clone();
        let mut session = InvoiceSession::new();

        let err = session.add_from_catalog(&catalog, &row, PriceTier::Gros, 1).unwrap_err();
        assert!(matches!(err, InvoiceError::ConfigurationMismatch { .. }));
        assert_eq!(session.state(), SessionState::Empty);

        let item = session.add_from_catalog(&catalog, &row, PriceTier::Detail, 2).unwrap();
        assert_eq!(item.unit_price, Decimal::from(150));
        assert_eq!(session.state(), SessionState::Building);
    }

    #[test]
    fn explicit_client_id_is_slugged() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());
        let mut req = request();
        req.client_id = " C-042 ".into();
        let invoice = session.generate(&req, &issuer(), today()).unwrap();
        assert_eq!(invoice.transaction.client_id, "c-042");
    }

    #[test]
    fn client_id_cannot_name_other_folders() {
        let session = {
            let mut s = InvoiceSession::new();
            s.add_item(chair());
            s
        };
        for raw in ["../../../escaped", "/etc/passwd", "a/../b"] {
            let mut req = request();
            req.client_id = raw.into();
            let id = session.prepare(&req, &issuer(), today()).unwrap().transaction.client_id;
            assert!(!id.contains('/') && !id.contains(".."), "{raw} -> {id}");
        }

        let mut req = request();
        req.client_id = "../..".into();
        let err = session.prepare(&req, &issuer(), today()).unwrap_err();
        assert!(matches!(err, InvoiceError::ValidationFailure(_)));
    }

    #[test]
    fn prepare_leaves_the_session_alone_until_commit() {
        let mut session = InvoiceSession::new();
        session.add_item(chair());

        let invoice = session.prepare(&request(), &issuer(), today()).unwrap();
        assert_eq!(invoice.transaction.transaction_number, 1000);
        assert_eq!(session.state(), SessionState::Building);
        assert_eq!(session.next_transaction_number(), 1000);

        // Dropping a prepared invoice costs nothing; the next one reuses the number.
        let again = session.prepare(&request(), &issuer(), today()).unwrap();
        session.commit(&again).unwrap();
        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(session.next_transaction_number(), 1001);

        // A second commit of the same invoice is refused.
        assert!(session.commit(&invoice).is_err());
        assert_eq!(session.next_transaction_number(), 1001);
    }
}
