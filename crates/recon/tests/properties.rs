// Property-based tests for normalization, column mapping and reconciliation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_recon::mapper::map_columns;
use tally_recon::normalize::parse_amount;
use tally_recon::*;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// One alias per canonical field, each with random case and padding.
fn arb_header_set() -> impl Strategy<Value = Vec<String>> {
    let per_field: Vec<_> = CanonicalField::ALL
        .into_iter()
        .map(|field| {
            let aliases: Vec<&'static str> = field.default_aliases().to_vec();
            (
                prop::sample::select(aliases),
                prop::collection::vec(any::<bool>(), 32),
                0usize..3,
                0usize..3,
            )
                .prop_map(|(alias, upper, left, right)| {
                    let cased: String = alias
                        .chars()
                        .zip(upper.iter().cycle())
                        .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c })
                        .collect();
                    format!("{}{}{}", " ".repeat(left), cased, " ".repeat(right))
                })
        })
        .collect();
    per_field.prop_shuffle()
}

/// Decimal with at most two fraction digits.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-99_999_999i64..99_999_999, 0u32..=2).prop_map(|(units, scale)| Decimal::new(units, scale))
}

/// Render with thousands separators on the integer part.
fn with_thousands(d: Decimal) -> String {
    let raw = d.abs().to_string();
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (raw.clone(), None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if d.is_sign_negative() && !d.is_zero() { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

fn record(id: &str, amount: i64, failed: bool) -> TransactionRecord {
    TransactionRecord {
        id: 0,
        batch_id: BatchId(1),
        business_id: id.to_string(),
        occurred_at: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        source_account: "S".into(),
        destination_account: "D".into(),
        amount: Decimal::new(amount, 2),
        status: if failed { Status::Failed } else { Status::Successful },
        raw_attributes: BTreeMap::new(),
    }
}

/// Records with ids drawn from a small pool so sides overlap and repeat.
fn arb_side() -> impl Strategy<Value = Vec<TransactionRecord>> {
    prop::collection::vec((0u8..12, 0i64..4, any::<bool>()), 0..20).prop_map(|rows| {
        rows.into_iter()
            .map(|(id, amount, failed)| record(&format!("T{id}"), amount, failed))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn any_alias_spelling_maps_every_field(headers in arb_header_set()) {
        let map = map_columns(&headers, &ColumnAliases::new());
        prop_assert!(map.is_ok(), "headers {:?} failed to map", headers);
        let map = map.unwrap();
        let mut seen = BTreeSet::new();
        for field in CanonicalField::ALL {
            prop_assert!(seen.insert(map.index(field)), "{} bound to a taken column", field);
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn currency_renderings_parse_back(amount in arb_amount()) {
        let plain = amount.to_string();
        let grouped = with_thousands(amount);

        prop_assert_eq!(parse_amount(&plain).unwrap(), amount);
        prop_assert_eq!(parse_amount(&grouped).unwrap(), amount);
        if amount >= Decimal::ZERO {
            prop_assert_eq!(parse_amount(&format!("${grouped}")).unwrap(), amount);
            prop_assert_eq!(parse_amount(&format!("€{grouped}")).unwrap(), amount);
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn every_id_lands_in_exactly_one_bucket(a in arb_side(), b in arb_side()) {
        let result = reconcile(&a, &b, DuplicatePolicy::LastWins).unwrap();

        let union: BTreeSet<&str> = a.iter().chain(&b).map(|r| r.business_id.as_str()).collect();
        let mut placed: Vec<&str> = Vec::new();
        for bucket in [&result.exact, &result.discrepant, &result.only_a, &result.only_b] {
            placed.extend(bucket.iter().map(|c| c.business_id.as_str()));
        }
        let placed_set: BTreeSet<&str> = placed.iter().copied().collect();

        prop_assert_eq!(placed.len(), union.len(), "an id was placed twice");
        prop_assert_eq!(placed_set, union);

        let s = &result.summary;
        prop_assert_eq!(s.amount_discrepancies + s.status_discrepancies, s.discrepant);
        prop_assert_eq!(s.rows_a, a.len());
        prop_assert_eq!(s.duplicates_a + s.exact + s.discrepant + s.only_a, a.len());
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn swapping_sides_swaps_only_buckets(a in arb_side(), b in arb_side()) {
        let ab = reconcile(&a, &b, DuplicatePolicy::LastWins).unwrap();
        let ba = reconcile(&b, &a, DuplicatePolicy::LastWins).unwrap();

        let ids = |v: &[Classification]| v.iter().map(|c| c.business_id.clone()).collect::<BTreeSet<_>>();
        prop_assert_eq!(ids(&ab.only_a), ids(&ba.only_b));
        prop_assert_eq!(ids(&ab.only_b), ids(&ba.only_a));
        prop_assert_eq!(ids(&ab.exact), ids(&ba.exact));
        prop_assert_eq!(ids(&ab.discrepant), ids(&ba.discrepant));
    }
}
