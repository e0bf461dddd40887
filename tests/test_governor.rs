//! End-to-end admission scenarios through the governance handle
//!
//! Each test drives a manual clock and interleaves `decide` with recorded
//! outcomes the way the message-handling layer does.


use request_governor::governor::UsageWindow;
use request_governor::types::{ChatKey, ChatType};
use request_governor::{Config, DenyReason, PenaltyReason, RequestOutcome};
use std::time::Duration;
use test_helpers::{T0, governance, governance_with};

/// Admit then record one successful request from `chat`
fn admit_and_record(gov: &request_governor::Governance, chat: &ChatKey) -> bool {
    let decision = gov.decide(chat, ChatType::Private);
    if decision.allowed {
        gov.record(chat.clone(), ChatType::Private, "tiktok", true, None);
    }
    decision.allowed
}

// =============================================================================
// Per-chat rate limits
// =============================================================================

#[test]
fn test_eleventh_request_in_a_minute_is_rate_limited() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("1001");

    for i in 0..10 {
        assert!(admit_and_record(&gov, &chat), "request {} should pass", i + 1);
        clock.advance(Duration::from_secs(3));
    }
    clock.set(T0 + 30_000);

    let decision = gov.decide(&chat, ChatType::Private);
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::RateLimit));
    // T0 is 20s past a minute boundary; 30s later the next boundary is 10s away
    assert_eq!(decision.retry_after_ms, 10_000);
    assert_eq!(decision.usage.minute.used, 10);
}

#[test]
fn test_rate_limit_clears_after_window_slides() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("1002");

    for _ in 0..10 {
        assert!(admit_and_record(&gov, &chat));
        clock.advance(Duration::from_secs(3));
    }
    assert!(!gov.decide(&chat, ChatType::Private).allowed);

    // The first request was at T0; one minute later it leaves the window
    clock.set(T0 + 60_000);
    assert!(gov.decide(&chat, ChatType::Private).allowed);
}

#[test]
fn test_chat_types_use_their_own_limits() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("-100200");

    for _ in 0..15 {
        let decision = gov.decide(&chat, ChatType::Supergroup);
        assert!(decision.allowed);
        gov.record(chat.clone(), ChatType::Supergroup, "youtube", true, None);
        clock.advance(Duration::from_secs(3));
    }
    let decision = gov.decide(&chat, ChatType::Supergroup);
    assert!(decision.allowed);
    assert_eq!(decision.usage.minute.limit, 30);
}

// =============================================================================
// Penalties
// =============================================================================

#[test]
fn test_three_failures_arm_a_five_minute_penalty() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("2001");

    for _ in 0..2 {
        let penalty = gov.report_outcome(RequestOutcome::new("2001", ChatType::Private, "x", false));
        assert!(penalty.is_none());
        clock.advance(Duration::from_secs(10));
    }
    let penalized_at = gov.now();
    let penalty = gov
        .report_outcome(RequestOutcome::new("2001", ChatType::Private, "x", false))
        .expect("third failure arms a penalty");
    assert_eq!(penalty.reason, PenaltyReason::RepeatedFailures);
    assert_eq!(penalty.until, penalized_at + 5 * 60_000);

    clock.set(penalty.until - 1);
    let decision = gov.decide(&chat, ChatType::Private);
    assert_eq!(decision.reason, Some(DenyReason::Penalty));
    assert_eq!(decision.retry_after_ms, 1);

    clock.set(penalty.until + 1);
    assert!(gov.decide(&chat, ChatType::Private).allowed);
}

#[test]
fn test_more_failures_escalate_the_penalty() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("2002");

    let mut last = None;
    for _ in 0..5 {
        last = gov.report_outcome(RequestOutcome::new("2002", ChatType::Private, "x", false));
        clock.advance(Duration::from_secs(5));
    }
    let penalty = last.expect("fifth failure re-arms the penalty");
    assert_eq!(penalty.until - penalty.applied_at, 15 * 60_000);
    assert!(gov.governor().penalty(&chat, gov.now()).is_some());
}

#[test]
fn test_successes_do_not_reset_failure_count() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("2003");

    for success in [false, true, false, true] {
        gov.report_outcome(RequestOutcome::new("2003", ChatType::Private, "x", success));
        clock.advance(Duration::from_secs(20));
    }
    let penalty = gov.report_outcome(RequestOutcome::new("2003", ChatType::Private, "x", false));
    assert!(penalty.is_some());
    assert!(gov.governor().penalty(&chat, gov.now()).is_some());
}

#[test]
fn test_rapid_fire_arms_penalty() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("3001");

    for _ in 0..5 {
        assert!(admit_and_record(&gov, &chat));
        clock.advance(Duration::from_secs(1));
    }

    let decision = gov.decide(&chat, ChatType::Private);
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::RapidFire));
    assert_eq!(decision.retry_after_ms, 120_000);

    clock.advance_ms(1);
    let decision = gov.decide(&chat, ChatType::Private);
    assert_eq!(decision.reason, Some(DenyReason::Penalty));
    assert_eq!(
        gov.governor().penalty(&chat, gov.now()).map(|p| p.reason),
        Some(PenaltyReason::RapidFire)
    );
}

#[test]
fn test_rapid_fire_counts_requests_still_in_flight() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("3004");

    // Links arrive faster than any download finishes
    let mut reasons = Vec::new();
    for _ in 0..8 {
        reasons.push(gov.decide(&chat, ChatType::Private).reason);
        clock.advance_ms(200);
    }

    assert!(reasons[..5].iter().all(Option::is_none));
    assert_eq!(reasons[5], Some(DenyReason::RapidFire));
    assert!(reasons[6..].iter().all(|r| *r == Some(DenyReason::Penalty)));
    assert_eq!(gov.chat(&chat).total_requests, 0);
}

#[test]
fn test_group_burst_allowance_raises_rapid_fire_threshold() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("-3002");

    for _ in 0..7 {
        assert!(gov.decide(&chat, ChatType::Group).allowed);
        gov.record(chat.clone(), ChatType::Group, "x", true, None);
        clock.advance_ms(500);
    }
    assert!(gov.decide(&chat, ChatType::Group).allowed);
}

#[test]
fn test_manual_penalty_and_clear() {
    let (gov, _) = governance();
    let chat = ChatKey::new("3003");

    gov.governor()
        .penalize(&chat, PenaltyReason::Manual, Duration::from_secs(60), gov.now());
    assert_eq!(
        gov.decide(&chat, ChatType::Private).reason,
        Some(DenyReason::Penalty)
    );

    assert!(gov.governor().clear_penalty(&chat));
    assert!(gov.decide(&chat, ChatType::Private).allowed);
}

// =============================================================================
// Global limits
// =============================================================================

#[test]
fn test_global_limit_applies_across_chats() {
    let mut config = Config::default();
    config.global.per_minute = 3;
    let (gov, clock) = governance_with(config);

    for chat in ["a", "b", "c"] {
        assert!(gov.decide(&ChatKey::new(chat), ChatType::Private).allowed);
    }

    let decision = gov.decide(&ChatKey::new("d"), ChatType::Private);
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::GlobalLimit));
    assert_eq!(decision.retry_after_ms, 60_000);
    // The chat itself is nowhere near its own limits
    assert_eq!(decision.usage.minute.used, 0);

    clock.advance(Duration::from_secs(60));
    assert!(gov.decide(&ChatKey::new("d"), ChatType::Private).allowed);
}

#[test]
fn test_denials_do_not_consume_global_budget() {
    let mut config = Config::default();
    config.global.per_minute = 2;
    let (gov, _) = governance_with(config);

    let penalized = ChatKey::new("p");
    gov.governor()
        .penalize(&penalized, PenaltyReason::Manual, Duration::from_secs(600), gov.now());
    for _ in 0..5 {
        assert!(!gov.decide(&penalized, ChatType::Private).allowed);
    }

    assert!(gov.decide(&ChatKey::new("x"), ChatType::Private).allowed);
    assert!(gov.decide(&ChatKey::new("y"), ChatType::Private).allowed);
    assert_eq!(gov.governor().stats(gov.now()).global_window_len, 2);
}

// =============================================================================
// Warnings
// =============================================================================

#[test]
fn test_warning_issued_once_per_suppression_window() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("4001");

    let mut warnings = Vec::new();
    for i in 0..10 {
        let decision = gov.decide(&chat, ChatType::Private);
        assert!(decision.allowed);
        if let Some(warning) = decision.warning {
            warnings.push((i + 1, warning));
        }
        gov.report_outcome(RequestOutcome::new("4001", ChatType::Private, "x", true));
        clock.advance(Duration::from_secs(3));
    }

    // Successful outcomes do not lift the suppression window
    assert_eq!(warnings.len(), 1);
    let (request, warning) = warnings[0];
    assert_eq!(request, 8);
    assert_eq!(warning.window, UsageWindow::Minute);
    assert!(warning.ratio >= 0.8);
}

#[test]
fn test_warning_reissued_after_suppression_window() {
    let (gov, clock) = governance();
    let chat = ChatKey::new("4002");

    // Fill 8 of 10 minute slots, then ask again 5 minutes after the warning
    for _ in 0..8 {
        gov.decide(&chat, ChatType::Private);
        gov.record(chat.clone(), ChatType::Private, "x", true, None);
        clock.advance(Duration::from_secs(3));
    }
    let warned_at = gov.governor().warning(&chat).expect("warned").issued_at;

    clock.set(warned_at + 5 * 60_000);
    for _ in 0..8 {
        gov.record(chat.clone(), ChatType::Private, "x", true, None);
        clock.advance(Duration::from_secs(3));
    }
    let decision = gov.decide(&chat, ChatType::Private);
    assert!(decision.allowed);
    assert!(decision.warning.is_some());
}

// =============================================================================
// Master switch
// =============================================================================

#[test]
fn test_disabled_governance_admits_everything() {
    let mut config = Config::default();
    config.enabled = false;
    let (gov, _) = governance_with(config);
    let chat = ChatKey::new("5001");

    for _ in 0..50 {
        let decision = gov.decide(&chat, ChatType::Private);
        assert!(decision.allowed);
        assert!(decision.warning.is_none());
        gov.record(chat.clone(), ChatType::Private, "x", false, None);
        assert!(gov.on_failure(&chat).is_none());
    }

    // Accounting still happens
    assert_eq!(gov.chat(&chat).total_requests, 50);
}
