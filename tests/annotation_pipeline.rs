//! 行标注管道集成测试
//!
//! 覆盖降级模式与就绪模式下的标注结果、文档顺序以及文本处理的性质测试

use proptest::prelude::*;

use jlyrics::annotation::pipeline::classify;
use jlyrics::annotation::VowelClass;
use jlyrics::{end_vowel, mora_count, normalize, segment};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{MockReadingService, TestEnvironment, TestEnvironmentBuilder, FAILURE_MARKER};

async fn ready_environment() -> TestEnvironment {
    let env = TestEnvironmentBuilder::new().build();
    env.lifecycle.ensure_started_and_wait().await;
    env
}

fn degraded_environment() -> TestEnvironment {
    TestEnvironmentBuilder::new()
        .with_service(MockReadingService::failing())
        .build()
}

#[tokio::test]
async fn test_tag_only_line_is_blank() {
    let env = ready_environment().await;

    let annotation = env.pipeline.annotate("[Chorus]").await;
    assert_eq!(annotation.mora_count, 0);
    assert_eq!(annotation.end_vowel, None);
    assert!(annotation.mora_list.is_empty());
    assert!(annotation.is_blank());
    assert_eq!(annotation.raw_text, "[Chorus]");
}

#[tokio::test]
async fn test_ruby_counts_without_engine() {
    let env = degraded_environment();

    let annotation = env.pipeline.annotate("明日(あした)へ").await;
    assert_eq!(annotation.mora_count, 4);
    assert_eq!(annotation.end_vowel, Some(VowelClass::E));
    assert_eq!(annotation.normalized_text, "あしたへ");
    assert_eq!(annotation.ruby.len(), 1);
    assert_eq!(annotation.ruby[0].kanji, "明日");
    assert_eq!(annotation.converted_text, None);
}

#[tokio::test]
async fn test_kanji_uncounted_without_engine() {
    let env = degraded_environment();
    env.lifecycle.ensure_started_and_wait().await;

    let annotation = env.pipeline.annotate("明日").await;
    assert_eq!(annotation.mora_count, 0);
    assert_eq!(annotation.end_vowel, None);
}

#[tokio::test]
async fn test_kanji_converted_when_ready() {
    let env = ready_environment().await;

    let annotation = env.pipeline.annotate("明日").await;
    assert_eq!(annotation.mora_count, 3);
    assert_eq!(annotation.mora_list, vec!["あ", "し", "た"]);
    assert_eq!(annotation.end_vowel, Some(VowelClass::A));
    assert_eq!(annotation.converted_text.as_deref(), Some("あした"));
    assert_eq!(annotation.effective_text(), "あした");
}

#[tokio::test]
async fn test_kana_line_has_no_converted_text() {
    let env = ready_environment().await;

    let annotation = env.pipeline.annotate("きゃりーぱみゅぱみゅ").await;
    assert_eq!(annotation.converted_text, None);
    assert_eq!(
        annotation.mora_list,
        vec!["きゃ", "り", "ー", "ぱ", "みゅ", "ぱ", "みゅ"]
    );
    // 以小书假名结尾的行没有行末母音
    assert_eq!(annotation.end_vowel, None);
}

#[tokio::test]
async fn test_summary_lists_every_step() {
    let env = ready_environment().await;

    let annotation = env.pipeline.annotate("[Verse]空(そら)と夢").await;
    let summary = annotation.summary();
    assert!(summary.starts_with("モーラ数: 5 | 母音: e"), "{}", summary);
    assert!(summary.contains("分解: そ / ら / と / ゆ / め"));
    assert!(summary.contains("変換前: [Verse]空(そら)と夢"));
    assert!(summary.contains("ルビ: 空→そら"));
    assert!(summary.contains("変換後: そらとゆめ"));
}

#[tokio::test]
async fn test_document_order_preserved() {
    let env = TestEnvironmentBuilder::new()
        .with_parallelism(true, 4)
        .build();
    env.lifecycle.ensure_started_and_wait().await;

    let lines: Vec<String> = (0..100)
        .map(|i| match i % 4 {
            0 => format!("[Verse {}]", i),
            1 => "さくら".repeat(i % 7 + 1),
            2 => "明日".to_string(),
            _ => "ー".repeat(i % 5),
        })
        .collect();

    let annotations = env.pipeline.annotate_document(&lines).await;
    assert_eq!(annotations.len(), lines.len());

    for (line, annotation) in lines.iter().zip(&annotations) {
        assert_eq!(&annotation.raw_text, line, "annotations must keep input order");
        let expected = env.pipeline.annotate(line).await;
        assert_eq!(annotation, &expected);
    }

    let stats = env.pipeline.stats().snapshot();
    assert_eq!(stats.documents_annotated, 1);
    assert_eq!(stats.lines_annotated, 200);
}

#[tokio::test]
async fn test_sequential_and_parallel_agree() {
    let lines: Vec<String> = (0..64).map(|i| format!("花の{}色(いろ)", i)).collect();

    let sequential = TestEnvironmentBuilder::new()
        .with_parallelism(false, 1)
        .build();
    sequential.lifecycle.ensure_started_and_wait().await;
    let parallel = TestEnvironmentBuilder::new()
        .with_parallelism(true, 8)
        .build();
    parallel.lifecycle.ensure_started_and_wait().await;

    assert_eq!(
        sequential.pipeline.annotate_document(&lines).await,
        parallel.pipeline.annotate_document(&lines).await
    );
}

#[tokio::test]
async fn test_failed_line_does_not_abort_document() {
    let env = ready_environment().await;

    let lines = vec![
        "空".to_string(),
        format!("{}空", FAILURE_MARKER),
        "花".to_string(),
    ];
    let annotations = env.pipeline.annotate_document(&lines).await;

    let counts: Vec<usize> = annotations.iter().map(|a| a.mora_count).collect();
    assert_eq!(counts, vec![2, 0, 2]);
    assert_eq!(annotations[1].converted_text, None);
    assert_eq!(env.lifecycle.stats().snapshot().conversion_failures, 1);
}

#[tokio::test]
async fn test_json_uses_camel_case_and_omits_empty_fields() {
    let env = degraded_environment();

    let value = serde_json::to_value(env.pipeline.annotate("さくら").await).unwrap();
    assert_eq!(value["moraCount"], 3);
    assert_eq!(value["endVowel"], "a");
    assert_eq!(value["rawText"], "さくら");
    assert!(value.get("convertedText").is_none());
    assert!(value.get("ruby").is_none());
}

#[test]
fn test_free_functions() {
    assert_eq!(normalize("[Chorus]君(きみ)へ"), "きみへ");
    assert_eq!(segment("ちょっと"), vec!["ちょ", "っ", "と"]);
    assert_eq!(mora_count("ちょっと"), 3);
    assert_eq!(end_vowel("ありがとー"), Some(VowelClass::O));
    assert_eq!(end_vowel("Hello"), None);
}

proptest! {
    #[test]
    fn prop_non_kana_has_no_morae(s in "[a-zA-Z0-9 ,.!?一-龯]{0,32}") {
        prop_assert!(segment(&s).is_empty());
        prop_assert_eq!(mora_count(&s), 0);
    }

    #[test]
    fn prop_count_matches_segmentation(s in "[ぁ-んァ-ヶーa-z一-龯 ]{0,32}") {
        prop_assert_eq!(segment(&s).len(), mora_count(&s));
    }

    #[test]
    fn prop_segmentation_keeps_every_kana(s in "[ぁ-んァ-ヶーa-z一-龯 ]{0,32}") {
        let kana: String = s.chars().filter(|&c| classify(c).is_segmentable()).collect();
        prop_assert_eq!(segment(&s).concat(), kana);
    }

    #[test]
    fn prop_normalize_idempotent_without_markup(s in "[ぁ-んァ-ヶーa-z一-龯 ]{0,32}") {
        let once = normalize(&s);
        prop_assert_eq!(&once, &s);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn prop_tags_never_survive(body in "[a-zA-Z0-9 ]{0,12}", text in "[ぁ-ん]{0,12}") {
        let line = format!("[{}]{}", body, text);
        prop_assert_eq!(normalize(&line), text);
    }
}
