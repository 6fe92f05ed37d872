//! A/B allocation exercised through the quote service: variant rule
//! filtering, sticky assignment, and the significance readout.

mod common;

use common::{always, fixed_rule, input, service_with_registry, StaticRegistry};
use rust_decimal::Decimal;

use clearquote::pricing::{
    AbTest, Arm, CostCenter, QuoteError, QuoteOptions, RecommendedAction, RuleId, RuleType,
    StrategyVariant,
};

fn surcharge_test(allocation_percentage_b: u8) -> AbTest {
    AbTest {
        id: "exp-weekend".to_string(),
        name: "weekend surcharge trial".to_string(),
        strategy_a: StrategyVariant {
            label: "control".to_string(),
            rule_ids: vec![RuleId("flat-surcharge-a".to_string())],
        },
        strategy_b: StrategyVariant {
            label: "challenger".to_string(),
            rule_ids: vec![RuleId("flat-surcharge-b".to_string())],
        },
        allocation_percentage_b,
    }
}

fn competing_rules() -> Vec<clearquote::pricing::PricingRule> {
    vec![
        fixed_rule(
            "base-fee",
            RuleType::BaseRate,
            1,
            Decimal::new(80, 0),
            CostCenter::Total,
            always(),
        ),
        fixed_rule(
            "flat-surcharge-a",
            RuleType::Surcharge,
            10,
            Decimal::new(20, 0),
            CostCenter::Total,
            always(),
        ),
        fixed_rule(
            "flat-surcharge-b",
            RuleType::Surcharge,
            10,
            Decimal::new(5, 0),
            CostCenter::Total,
            always(),
        ),
    ]
}

fn options_for(customer_key: &str) -> QuoteOptions {
    QuoteOptions {
        use_ai: false,
        ab_test_id: Some("exp-weekend".to_string()),
        customer_key: Some(customer_key.to_string()),
    }
}

#[test]
fn each_arm_prices_with_only_its_own_exclusive_rules() {
    let service = service_with_registry(
        competing_rules(),
        StaticRegistry::with(surcharge_test(50)),
    );

    // Walk customer keys until both arms have been observed.
    let mut seen_a = false;
    let mut seen_b = false;
    for n in 0..50 {
        let outcome = service
            .calculate(&input(), &options_for(&format!("cust-{n}")))
            .expect("quote calculates");
        let assignment = outcome.ab_assignment.as_ref().expect("assignment attached");
        let expected_total = match assignment.arm {
            // base 80 + surcharge 20, then 20% tax
            Arm::A => Decimal::new(12000, 2),
            // base 80 + surcharge 5, then 20% tax
            Arm::B => Decimal::new(10200, 2),
        };
        assert_eq!(outcome.breakdown.total_amount, expected_total);
        match assignment.arm {
            Arm::A => seen_a = true,
            Arm::B => seen_b = true,
        }
        if seen_a && seen_b {
            return;
        }
    }
    panic!("50 customers never covered both arms");
}

#[test]
fn repeat_quotes_for_one_customer_stay_in_one_arm() {
    let service = service_with_registry(
        competing_rules(),
        StaticRegistry::with(surcharge_test(50)),
    );

    let first = service
        .calculate(&input(), &options_for("cust-sticky"))
        .expect("quote calculates");
    let first_arm = first.ab_assignment.expect("assignment attached").arm;

    for _ in 0..5 {
        let repeat = service
            .calculate(&input(), &options_for("cust-sticky"))
            .expect("quote calculates");
        assert_eq!(
            repeat.ab_assignment.expect("assignment attached").arm,
            first_arm
        );
        assert_eq!(repeat.breakdown.total_amount, first.breakdown.total_amount);
    }
}

#[test]
fn unknown_test_id_fails_the_calculation() {
    let service = service_with_registry(competing_rules(), StaticRegistry::default());

    let err = service
        .calculate(&input(), &options_for("cust-1"))
        .expect_err("unknown test rejected");
    assert!(matches!(err, QuoteError::UnknownTest(id) if id == "exp-weekend"));
}

#[test]
fn degenerate_allocation_split_is_a_configuration_error() {
    // 150 would route every customer to B; 0 would route every one to A.
    for allocation in [150, 0] {
        let service = service_with_registry(
            competing_rules(),
            StaticRegistry::with(surcharge_test(allocation)),
        );

        let err = service
            .calculate(&input(), &options_for("cust-1"))
            .expect_err("misconfigured test rejected");
        assert!(matches!(err, QuoteError::TestConfig(_)), "got {err:?}");

        let err = service
            .assign_variant("exp-weekend", "cust-1")
            .expect_err("misconfigured test rejected");
        assert!(matches!(err, QuoteError::TestConfig(_)), "got {err:?}");
    }
}

#[test]
fn conversions_feed_the_significance_readout() {
    let service = service_with_registry(
        competing_rules(),
        StaticRegistry::with(surcharge_test(50)),
    );

    for n in 0..200 {
        let key = format!("cust-{n}");
        let arm = service
            .assign_variant("exp-weekend", &key)
            .expect("assignment");
        // Convert most of B and little of A to force a detectable lift.
        let convert = match arm {
            Arm::B => n % 10 != 0,
            Arm::A => n % 20 == 0,
        };
        if convert {
            service
                .record_conversion("exp-weekend", &key)
                .expect("conversion records");
        }
    }

    let report = service.significance("exp-weekend").expect("significance");
    assert!(report.totals.assigned_a + report.totals.assigned_b == 200);
    assert_eq!(report.recommended_action, RecommendedAction::AdoptB);
    assert!(report.p_value.expect("p-value present") < 0.05);
}

#[test]
fn conversion_for_an_unseen_customer_is_reported_missing() {
    let service = service_with_registry(
        competing_rules(),
        StaticRegistry::with(surcharge_test(50)),
    );

    let err = service
        .record_conversion("exp-weekend", "cust-unseen")
        .expect_err("conversion without assignment fails");
    assert!(matches!(err, QuoteError::Assignments(_)));
}
