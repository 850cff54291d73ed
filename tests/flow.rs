//! Selection flow integration tests
//!
//! Drives the dialog controller through whole orders with scripted speech

use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use voice_kiosk::flow::prompts;
use voice_kiosk::payment::SimulatedPayment;
use voice_kiosk::speech::ScriptedSpeech;
use voice_kiosk::{Catalog, Config, Error, NavigationEvent, Outcome, Step, Transcript};

mod common;

use common::{controller_with, drain_events, spoken, test_config, test_controller, visited};

async fn say(controller: &mut voice_kiosk::DialogController, text: &str) -> Outcome {
    let transcript = Transcript::new(text, controller.step_id());
    assert_ok!(controller.handle_transcript(transcript).await)
}

#[tokio::test]
async fn test_item_by_voice_starts_session() {
    let (mut controller, speech) = test_controller();

    let outcome = say(&mut controller, "아메리카노 주세요").await;

    assert_eq!(outcome, Outcome::Advanced(Step::OptionGroup(0)));
    let session = controller.session().unwrap();
    assert_eq!(session.item().id, "americano");
    assert_eq!(session.current_step(), Step::OptionGroup(0));
    assert_eq!(
        spoken(&controller, &speech).await,
        [
            "아메리카노를 선택하셨습니다. 옵션을 선택해주세요.",
            "온도를 선택해주세요. 뜨거운, 차가운 중에서 선택하세요.",
        ]
    );
}

#[tokio::test]
async fn test_unknown_item_reprompts() {
    let (mut controller, speech) = test_controller();
    let before = controller.step_id();

    assert_eq!(say(&mut controller, "콜라").await, Outcome::Reprompted);

    assert_eq!(controller.step(), Step::Browsing);
    assert_eq!(controller.step_id(), before);
    assert!(controller.session().is_none());
    assert_eq!(spoken(&controller, &speech).await, [prompts::item_not_found()]);
}

#[tokio::test]
async fn test_temperature_then_size() {
    let (mut controller, speech) = test_controller();
    say(&mut controller, "아메리카노").await;
    spoken(&controller, &speech).await;

    assert_eq!(
        say(&mut controller, "차가운 걸로요").await,
        Outcome::Advanced(Step::OptionGroup(1))
    );
    assert_eq!(controller.session().unwrap().option("temperature"), Some("ice"));
    assert_eq!(
        spoken(&controller, &speech).await,
        [
            "확인했습니다. 차가운을 선택하셨습니다.",
            "사이즈를 선택해주세요. 레귤러, 라지 중에서 선택하세요.",
        ]
    );

    assert_eq!(
        say(&mut controller, "라지 사이즈로 주세요").await,
        Outcome::Advanced(Step::OptionGroup(2))
    );
    assert_eq!(controller.session().unwrap().option("size"), Some("large"));
}

#[tokio::test]
async fn test_option_miss_keeps_step() {
    let (mut controller, speech) = test_controller();
    say(&mut controller, "아메리카노").await;
    spoken(&controller, &speech).await;

    assert_eq!(say(&mut controller, "미지근하게").await, Outcome::Reprompted);

    assert_eq!(controller.step(), Step::OptionGroup(0));
    assert!(controller.session().unwrap().option("temperature").is_none());
    assert_eq!(spoken(&controller, &speech).await, [prompts::option_not_found()]);
}

#[tokio::test]
async fn test_steps_follow_declared_group_order() {
    let catalog = Catalog::builtin().unwrap();
    for item in catalog.items() {
        let (mut controller, _speech) = test_controller();
        let mut events = controller.subscribe();
        assert_ok!(controller.select(&item.id).await);

        let mut keys = Vec::new();
        while let Step::OptionGroup(index) = controller.step() {
            let group = controller.session().unwrap().item().group_at(index).unwrap();
            keys.push(group.key.clone());
            let first = controller.candidates()[0].id.clone();
            assert_ok!(controller.select(&first).await);
        }

        let declared: Vec<_> = item.option_groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys, declared, "{}", item.id);
        assert_eq!(controller.step(), Step::AwaitingPayment);

        let option_steps = visited(&drain_events(&mut events))
            .into_iter()
            .filter(|step| matches!(step, Step::OptionGroup(_)))
            .count();
        assert_eq!(option_steps, item.option_groups.len());
    }
}

#[tokio::test]
async fn test_voice_order_to_receipt() {
    let (mut controller, speech) = test_controller();
    let mut events = controller.subscribe();

    for text in ["아메리카노", "차가운 걸로요", "라지", "더블샷"] {
        assert!(matches!(say(&mut controller, text).await, Outcome::Advanced(_)));
    }
    assert_eq!(controller.step(), Step::AwaitingPayment);
    spoken(&controller, &speech).await;

    let outcome = say(&mut controller, "카드로 할게요").await;

    let Outcome::Completed(order_id) = outcome else {
        panic!("expected a completed order, got {outcome:?}");
    };
    let digits = order_id.as_str().strip_prefix("ORDER-").unwrap();
    assert_eq!(digits.len(), 6);
    assert!(digits.chars().all(|c| c.is_ascii_digit()));

    let session = controller.session().unwrap();
    assert!(session.is_complete());
    assert_eq!(session.payment().unwrap().id, "card");
    assert_eq!(controller.step(), Step::Done);

    let events = drain_events(&mut events);
    let steps = visited(&events);
    assert_eq!(&steps[steps.len() - 2..], [Step::Processing, Step::Done]);
    let Some(NavigationEvent::GoTo { order: Some(receipt), .. }) = events.last() else {
        panic!("receipt event missing");
    };
    assert_eq!(receipt.order_id.as_ref(), Some(&order_id));
    assert!(receipt.completed_at.is_some_and(|at| at >= receipt.started_at));
    assert_eq!(receipt.total, 4500);
    let chosen: Vec<_> = receipt.options.iter().map(|o| (o.label.as_str(), o.alias.as_str())).collect();
    assert_eq!(chosen, [("온도", "차가운"), ("사이즈", "라지"), ("샷", "더블샷")]);

    assert_eq!(
        spoken(&controller, &speech).await,
        [
            prompts::payment_confirmed("카드"),
            prompts::processing(),
            prompts::payment_complete(),
            prompts::order_complete(),
        ]
    );
}

#[tokio::test]
async fn test_unknown_payment_then_qr() {
    let (mut controller, speech) = test_controller();
    for id in ["espresso", "single"] {
        assert_ok!(controller.select(id).await);
    }
    spoken(&controller, &speech).await;

    assert_eq!(say(&mut controller, "현금").await, Outcome::Reprompted);
    assert_eq!(controller.step(), Step::AwaitingPayment);
    assert!(controller.session().unwrap().payment().is_none());
    assert_eq!(
        spoken(&controller, &speech).await,
        ["해당하는 결제 방법이 없습니다. 카드 또는 큐알 중에서 선택해주세요."]
    );

    let outcome = say(&mut controller, "큐알로 결제할게요").await;
    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(controller.session().unwrap().payment().unwrap().id, "qr");
}

#[tokio::test]
async fn test_tap_and_voice_reach_same_order() {
    let (mut by_voice, _) = test_controller();
    let mut voice_events = by_voice.subscribe();
    for text in ["카페라떼", "뜨거운", "레귤러", "싱글샷", "오트밀크", "카드"] {
        say(&mut by_voice, text).await;
    }

    let (mut by_tap, _) = test_controller();
    let mut tap_events = by_tap.subscribe();
    for id in ["cafe_latte", "hot", "regular", "single", "oat", "card"] {
        assert_ok!(by_tap.select(id).await);
    }

    let voice = by_voice.snapshot().order.unwrap();
    let tap = by_tap.snapshot().order.unwrap();
    assert_eq!(voice.item_id, tap.item_id);
    assert_eq!(voice.options, tap.options);
    assert_eq!(voice.payment, tap.payment);
    assert_eq!(voice.total, tap.total);
    assert!(voice.order_id.is_some() && tap.order_id.is_some());
    assert_eq!(
        visited(&drain_events(&mut voice_events)),
        visited(&drain_events(&mut tap_events))
    );
}

#[tokio::test]
async fn test_tap_outside_candidates_rejected() {
    let (mut controller, _) = test_controller();
    let before = controller.step_id();

    let err = assert_err!(controller.select("card").await);

    assert!(matches!(err, Error::InvalidSelection(_)));
    assert_eq!(controller.step(), Step::Browsing);
    assert_eq!(controller.step_id(), before);

    assert_ok!(controller.select("americano").await);
    assert!(matches!(
        controller.select("large").await,
        Err(Error::InvalidSelection(_))
    ));
    assert!(controller.session().unwrap().option("size").is_none());
}

#[tokio::test]
async fn test_stale_transcript_discarded() {
    let (mut controller, _) = test_controller();
    let captured = controller.step_id();

    // Tap lands while the utterance was still being recognized
    assert_ok!(controller.select("americano").await);

    let late = Transcript::new("아메리카노", captured);
    assert_eq!(assert_ok!(controller.handle_transcript(late).await), Outcome::Stale);
    assert_eq!(controller.step(), Step::OptionGroup(0));

    let late = Transcript::new("차가운", captured);
    assert_eq!(assert_ok!(controller.handle_transcript(late).await), Outcome::Stale);
    assert!(controller.session().unwrap().option("temperature").is_none());
}

#[tokio::test]
async fn test_back_from_options_discards_session() {
    let (mut controller, _) = test_controller();
    assert_ok!(controller.select("americano").await);
    assert_ok!(controller.select("ice").await);

    assert_eq!(controller.back(), Outcome::Advanced(Step::Browsing));
    assert!(controller.session().is_none());
    assert_eq!(controller.back(), Outcome::Ignored);
}

#[tokio::test]
async fn test_back_from_payment_reopens_last_group() {
    let (mut controller, speech) = test_controller();
    for id in ["americano", "hot", "regular", "double"] {
        assert_ok!(controller.select(id).await);
    }
    assert_eq!(controller.step(), Step::AwaitingPayment);
    spoken(&controller, &speech).await;

    assert_eq!(controller.back(), Outcome::Advanced(Step::OptionGroup(2)));

    let session = controller.session().unwrap();
    assert!(session.option("shot").is_none());
    assert_eq!(session.option("size"), Some("regular"));
    assert_eq!(
        spoken(&controller, &speech).await,
        ["샷을 선택해주세요. 싱글샷, 더블샷 중에서 선택하세요."]
    );
}

#[tokio::test]
async fn test_back_from_receipt_starts_new_order() {
    let (mut controller, _) = test_controller();
    for id in ["espresso", "double", "qr"] {
        assert_ok!(controller.select(id).await);
    }
    assert_eq!(controller.step(), Step::Done);

    assert_eq!(controller.back(), Outcome::Advanced(Step::Browsing));
    assert!(controller.session().is_none());
    assert_eq!(controller.new_order(), Outcome::Ignored);
}

#[tokio::test]
async fn test_new_order_mid_flow() {
    let (mut controller, _) = test_controller();
    assert_ok!(controller.select("lemonade").await);
    assert_eq!(controller.new_order(), Outcome::Advanced(Step::Browsing));
    assert_eq!(controller.candidates(), Catalog::builtin().unwrap().item_candidates());
}

#[tokio::test]
async fn test_declined_payment_returns_to_method_choice() {
    let (mut controller, speech) = controller_with(
        &test_config(),
        ScriptedSpeech::new(),
        SimulatedPayment::declining(Duration::ZERO),
    );
    let mut events = controller.subscribe();
    for id in ["espresso", "single"] {
        assert_ok!(controller.select(id).await);
    }
    spoken(&controller, &speech).await;

    assert_eq!(say(&mut controller, "카드").await, Outcome::PaymentFailed);

    let session = controller.session().unwrap();
    assert_eq!(session.current_step(), Step::AwaitingPayment);
    assert!(session.payment().is_none());
    assert!(session.order_id().is_none());
    assert!(
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, NavigationEvent::PaymentFailed { .. }))
    );

    let spoken = spoken(&controller, &speech).await;
    assert_eq!(spoken[spoken.len() - 2], prompts::payment_failed());
    assert_eq!(spoken[spoken.len() - 1], prompts::payment_prompt(&controller.candidates()));
}

#[tokio::test(start_paused = true)]
async fn test_pacing_between_steps() {
    let (mut controller, _) =
        controller_with(&Config::default(), ScriptedSpeech::new(), SimulatedPayment::instant());

    let started = tokio::time::Instant::now();
    assert_ok!(controller.select("espresso").await);
    assert!(started.elapsed() < Duration::from_millis(100));

    // Last option: confirmation delay, then checkout delay
    let started = tokio::time::Instant::now();
    assert_ok!(controller.select("double").await);
    assert!(started.elapsed() >= Duration::from_millis(3500));

    // Payment confirmation, then completion
    let started = tokio::time::Instant::now();
    assert_ok!(controller.select("card").await);
    assert!(started.elapsed() >= Duration::from_millis(4000));
}

#[tokio::test]
async fn test_without_speech_taps_still_work() {
    let (mut controller, speech) =
        controller_with(&test_config(), ScriptedSpeech::unavailable(), SimulatedPayment::instant());

    for id in ["espresso", "single", "card"] {
        assert_ok!(controller.select(id).await);
    }
    assert_eq!(controller.step(), Step::Done);
    assert!(spoken(&controller, &speech).await.is_empty());
}
