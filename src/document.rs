//! Content of a proforma invoice, laid out independently of the PDF backend.
//!
//! Every string that ends up on the page passes through
//! [`sanitize_text`](crate::sanitize::sanitize_text) here, so the renderer can
//! draw fields as-is.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::Result;
use crate::model::{ClientInfo, Discount, InvoiceTotals, IssuerConfig, LineItem, TransactionInfo};
use crate::sanitize::sanitize_text;
use crate::totals::TAX_RATE;
use crate::words::amount_in_words_or_placeholder;

const TERMS_TEMPLATE: &str = include_str!("../templates/terms.tera");

pub const TITLE: &str = "FACTURE PROFORMA";

#[derive(Debug, Clone, Serialize)]
pub struct ProformaDocument {
    pub title: String,
    pub issuer_lines: Vec<String>,
    pub client_lines: Vec<String>,
    pub transaction_lines: Vec<String>,
    pub table_header: [String; 4],
    pub rows: Vec<[String; 4]>,
    pub totals: Vec<(String, String)>,
    /// Paragraphs; the first one is the heading.
    pub terms: Vec<String>,
    pub closing: String,
}

/// Everything the document is a function of.
pub struct DocumentInput<'a> {
    pub issuer: &'a IssuerConfig,
    pub client: &'a ClientInfo,
    pub transaction: &'a TransactionInfo,
    pub items: &'a [LineItem],
    pub totals: &'a InvoiceTotals,
    pub discount: Discount,
    pub tax_enabled: bool,
}

pub fn build_document(input: &DocumentInput<'_>) -> Result<ProformaDocument> {
    let issuer = input.issuer;
    let currency = issuer.currency.as_str();

    let mut issuer_lines = vec![issuer.name.clone(), issuer.activity.clone(), issuer.address.clone()];
    if !issuer.phones.is_empty() {
        issuer_lines.push(format!("Tél : {}", issuer.phones.join(" / ")));
    }
    issuer_lines.push(format!("Email : {}", issuer.email));
    issuer_lines.push(format!("RC : {}   NIF : {}", issuer.rc, issuer.nif));

    let client = input.client;
    let client_lines = vec![
        format!("Client : {}", client.client_name.trim()),
        format!("Société : {}", client.company_name.trim()),
        format!("Adresse : {}", client.address.trim()),
        format!("Tél : {}", client.phone.trim()),
    ];

    let tx = input.transaction;
    let transaction_lines = vec![
        format!("N° transaction : {}", tx.transaction_number),
        format!("Date : {}", tx.transaction_date.format("%d/%m/%Y")),
        format!("Code client : {}", tx.client_id),
    ];

    let rows = input
        .items
        .iter()
        .map(|item| {
            [
                item.name.clone(),
                item.quantity.to_string(),
                format_money(item.unit_price),
                format_money(item.line_total()),
            ]
        })
        .collect();

    let totals = totals_block(input.totals, input.discount, input.tax_enabled, currency);
    let terms = render_terms(issuer)?;

    let closing = format!(
        "Arrêter la présente facture proforma à la somme de: {} dinars.",
        amount_in_words_or_placeholder(input.totals.grand_total)
    );

    let doc = ProformaDocument {
        title: TITLE.to_string(),
        issuer_lines,
        client_lines,
        transaction_lines,
        table_header: [
            "Désignation".to_string(),
            "Qté".to_string(),
            format!("Prix unitaire ({})", currency),
            format!("Montant ({})", currency),
        ],
        rows,
        totals,
        terms,
        closing,
    };
    Ok(doc.sanitized())
}

fn totals_block(
    totals: &InvoiceTotals,
    discount: Discount,
    tax_enabled: bool,
    currency: &str,
) -> Vec<(String, String)> {
    let money = |v: Decimal| format!("{} {}", format_money(v), currency);

    let discount_label = match discount {
        Discount::Percentage(pct) => format!("Remise ({} {})", pct.normalize(), discount.unit_label(currency)),
        Discount::Fixed(_) => format!("Remise ({})", discount.unit_label(currency)),
    };

    let mut block = vec![
        ("Sous-total".to_string(), money(totals.subtotal)),
        (discount_label, money(totals.discount_amount)),
        ("Total après remise".to_string(), money(totals.subtotal_after_discount)),
    ];
    if tax_enabled {
        let rate = (TAX_RATE * Decimal::ONE_HUNDRED).normalize();
        block.push((format!("TVA ({} %)", rate), money(totals.tax_amount)));
        block.push(("Total TTC".to_string(), money(totals.grand_total)));
    }
    block
}

fn render_terms(issuer: &IssuerConfig) -> Result<Vec<String>> {
    let mut context = Context::new();
    context.insert("payment_modes", &issuer.terms.payment_modes);
    context.insert("deposit_percent", &issuer.terms.deposit_percent);
    context.insert("lead_time", &issuer.terms.lead_time);
    context.insert("currency", &issuer.currency);

    let rendered = Tera::one_off(TERMS_TEMPLATE, &context, false)?;
    Ok(rendered
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect())
}

/// Two decimals, half away from zero, spaces between thousands.
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, dec_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, dec_part)
}

impl ProformaDocument {
    fn sanitized(self) -> Self {
        let clean = |v: Vec<String>| v.iter().map(|s| sanitize_text(s)).collect::<Vec<_>>();
        Self {
            title: sanitize_text(&self.title),
            issuer_lines: clean(self.issuer_lines),
            client_lines: clean(self.client_lines),
            transaction_lines: clean(self.transaction_lines),
            table_header: self.table_header.map(|s| sanitize_text(&s)),
            rows: self
                .rows
                .into_iter()
                .map(|row| row.map(|s| sanitize_text(&s)))
                .collect(),
            totals: self
                .totals
                .into_iter()
                .map(|(label, value)| (sanitize_text(&label), sanitize_text(&value)))
                .collect(),
            terms: clean(self.terms),
            closing: sanitize_text(&self.closing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TermsConfig;
    use crate::totals::compute_totals;
    use chrono::NaiveDate;

    fn issuer() -> IssuerConfig {
        IssuerConfig {
            name: "Ameublement El Bahia".into(),
            activity: "Meubles".into(),
            address: "12 Rue des Frères, Oran".into(),
            phones: vec!["0550 00 00 00".into()],
            email: "contact@example.dz".into(),
            rc: "RC-1".into(),
            nif: "NIF-1".into(),
            currency: "DA".into(),
            logo: None,
            terms: TermsConfig::default(),
        }
    }

    fn client() -> ClientInfo {
        ClientInfo {
            client_name: "Karim Benali".into(),
            company_name: "L\u{2019}Atelier du Bois".into(),
            address: "5 Boulevard de l\u{2019}ALN".into(),
            phone: "0661 11 22 33".into(),
        }
    }

    fn build(discount: Discount, tax_enabled: bool) -> ProformaDocument {
        build_for(&issuer(), discount, tax_enabled)
    }

    fn build_for(issuer: &IssuerConfig, discount: Discount, tax_enabled: bool) -> ProformaDocument {
        let items = vec![
            LineItem::new("Chaise d\u{2019}enfant", 4, Decimal::from(200)).unwrap(),
            LineItem::new("Table", 1, Decimal::from(200)).unwrap(),
        ];
        let totals = compute_totals(&items, discount, tax_enabled);
        let transaction = TransactionInfo {
            transaction_number: 1000,
            transaction_date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            client_id: "l-atelier-du-bois".into(),
        };
        build_document(&DocumentInput {
            issuer,
            client: &client(),
            transaction: &transaction,
            items: &items,
            totals: &totals,
            discount,
            tax_enabled,
        })
        .unwrap()
    }

    #[test]
    fn table_rows_carry_two_decimals() {
        let doc = build(Discount::default(), false);
        assert_eq!(
            doc.rows[0],
            [
                "Chaise d'enfant".to_string(),
                "4".to_string(),
                "200.00".to_string(),
                "800.00".to_string()
            ]
        );
    }

    #[test]
    fn totals_with_percentage_and_tax() {
        let doc = build(Discount::Percentage(Decimal::TEN), true);
        let labels: Vec<&str> = doc.totals.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Sous-total", "Remise (10 %)", "Total après remise", "TVA (19 %)", "Total TTC"]
        );
        assert_eq!(doc.totals[4].1, "1 071.00 DA");
        assert_eq!(
            doc.closing,
            "Arrêter la présente facture proforma à la somme de: mille soixante et onze dinars."
        );
    }

    #[test]
    fn tax_rows_are_omitted_when_disabled() {
        let doc = build(Discount::Fixed(Decimal::from(50)), false);
        let labels: Vec<&str> = doc.totals.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Sous-total", "Remise (DA)", "Total après remise"]);
        assert_eq!(doc.totals[2].1, "950.00 DA");
    }

    #[test]
    fn every_field_is_sanitized() {
        let mut issuer = issuer();
        issuer.name = "Ameublement l\u{2019}Oranais".into();
        issuer.address = "Rue de l\u{2019}Indépendance, Oran".into();
        issuer.terms.lead_time = "15 jours d\u{2019}atelier".into();
        issuer.terms.payment_modes = vec!["chèque à l\u{2019}ordre".into()];
        let doc = build_for(&issuer, Discount::default(), false);

        let all = serde_json::to_string(&doc).unwrap();
        assert!(!all.contains('\u{2019}'));
        assert_eq!(doc.client_lines[1], "Société : L'Atelier du Bois");
        assert_eq!(doc.transaction_lines[1], "Date : 17/10/2026");
        assert_eq!(doc.rows[0][0], "Chaise d'enfant");
        assert!(doc.issuer_lines.iter().any(|l| l.contains("l'Oranais")));
        assert!(doc.terms.iter().any(|p| p.contains("15 jours d'atelier")));
        assert!(doc.terms.iter().any(|p| p.contains("chèque à l'ordre")));
    }

    #[test]
    fn terms_are_rendered_from_issuer_settings() {
        let doc = build(Discount::default(), false);
        assert_eq!(doc.terms[0], "Conditions générales de vente");
        assert!(doc.terms.iter().any(|p| p.contains("acompte de 50 %")));
        assert!(doc.terms.iter().any(|p| p.contains("15 jours ouvrables")));
        assert!(doc.terms.iter().any(|p| p.contains("frais de transport")));
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(Decimal::new(1234567, 1)), "123 456.70");
        assert_eq!(format_money(Decimal::new(-9505, 3)), "-9.51");
        assert_eq!(format_money(Decimal::ZERO), "0.00");
    }
}
