//! Integration tests for the causal-LM adapter.

mod common;

use common::{id, ScriptedLm, WordTokenizer, EOS};
use lm_sampler::{
    CausalLmSampler, FinishReason, LmSampler, LoadConfig, SamplingConfig, StopToken,
};

// "hello world" encodes to two tokens
const PROMPT: &str = "hello world";
const PROMPT_LEN: usize = 2;

fn sampler(script: Vec<u32>) -> CausalLmSampler<ScriptedLm, WordTokenizer> {
    CausalLmSampler::new(
        "mock-neo",
        ScriptedLm::new(PROMPT_LEN, script),
        WordTokenizer::causal(),
    )
}

#[test]
fn test_send_prompt_ranks_last_position() {
    let sampler = sampler(vec![id("paris")]);
    let ranking = sampler.send_prompt(PROMPT, 4).unwrap();

    assert_eq!(ranking.len(), 4);
    assert_eq!(ranking.top().unwrap().text, "paris");
    assert!(ranking
        .iter()
        .zip(ranking.iter().skip(1))
        .all(|(a, b)| a.log_prob >= b.log_prob));
}

#[test]
fn test_send_prompt_drops_non_ascii() {
    let sampler = sampler(vec![id("café")]);
    let ranking = sampler.send_prompt(PROMPT, 1).unwrap();
    assert_eq!(ranking.top().unwrap().text, "caf");
}

#[test]
fn test_send_prompt_trims_after_dropping_non_ascii() {
    let sampler = sampler(vec![id("\u{fffd} the")]);
    let ranking = sampler.send_prompt(PROMPT, 1).unwrap();
    assert_eq!(ranking.top().unwrap().text, "the");
}

#[test]
fn test_stop_token_at_step_three_returns_first_two_steps() {
    let sampler = sampler(vec![id("a"), id("b"), id("stop"), id("c")]);
    let text = sampler
        .sample_several(PROMPT, 0.0, 10, &[StopToken::from("stop")])
        .unwrap();
    assert_eq!(text, "a b");
}

#[test]
fn test_stop_token_by_id() {
    let sampler = sampler(vec![id("a"), id("b"), id("c")]);
    let output = sampler
        .generate(PROMPT, &SamplingConfig::greedy(), 10, &[StopToken::Id(id("b"))])
        .unwrap();

    assert_eq!(output.token_ids, vec![id("a")]);
    assert_eq!(output.text, "a");
    assert_eq!(output.finish_reason, FinishReason::StopToken);
}

#[test]
fn test_budget_is_hard_ceiling() {
    let sampler = sampler(vec![id("a")]);
    let output = sampler
        .generate(PROMPT, &SamplingConfig::greedy(), 4, &[])
        .unwrap();

    assert_eq!(output.token_ids.len(), 4);
    assert_eq!(output.text, "a a a a");
    assert_eq!(output.finish_reason, FinishReason::MaxTokens);
}

#[test]
fn test_zero_budget_returns_empty_text() {
    let sampler = sampler(vec![id("a")]);
    assert_eq!(sampler.sample_several(PROMPT, 0.0, 0, &[]).unwrap(), "");
}

#[test]
fn test_end_of_sequence_stops_generation() {
    let sampler = sampler(vec![id("a"), EOS, id("b")]);
    let output = sampler
        .generate(PROMPT, &SamplingConfig::greedy(), 10, &[])
        .unwrap();

    assert_eq!(output.token_ids, vec![id("a")]);
    assert_eq!(output.text, "a");
    assert_eq!(output.finish_reason, FinishReason::EndOfSequence);
}

#[test]
fn test_greedy_is_deterministic() {
    let sampler = sampler(vec![id("a"), id("c"), id("b")]);
    let first = sampler.sample_several(PROMPT, 0.0, 6, &[]).unwrap();
    let second = sampler.sample_several(PROMPT, 0.0, 6, &[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "a c b b b b");
}

#[test]
fn test_seeded_sampling_is_reproducible() {
    let sampler = sampler(Vec::new());
    let config = SamplingConfig::greedy().temperature(2.0).seed(7);
    let first = sampler.generate(PROMPT, &config, 8, &[]).unwrap();
    let second = sampler.generate(PROMPT, &config, 8, &[]).unwrap();
    assert_eq!(first.token_ids, second.token_ids);
}

#[test]
fn test_negative_temperature_is_rejected() {
    let sampler = sampler(vec![id("a")]);
    let err = sampler.sample_several(PROMPT, -1.0, 3, &[]).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_empty_stop_string_is_rejected() {
    let sampler = sampler(vec![id("a")]);
    let err = sampler
        .sample_several(PROMPT, 0.0, 3, &[StopToken::from("   ")])
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_unsupported_model_name_fails_before_download() {
    let err = CausalLmSampler::from_pretrained("gpt2", &LoadConfig::default())
        .err()
        .unwrap();
    assert!(err.is_configuration());
}
