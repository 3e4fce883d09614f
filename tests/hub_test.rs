//! Tests against real Hub checkpoints. Run with `--ignored`.

use lm_sampler::{
    CausalLmSampler, LmSampler, LoadConfig, MaskedLmSampler, StopToken, TokenCostEstimator,
};

#[test]
#[ignore = "downloads bert-base-uncased"]
fn test_bert_predicts_capital() -> anyhow::Result<()> {
    let sampler = MaskedLmSampler::from_pretrained("bert-base-uncased", &LoadConfig::default())?;
    let ranking = sampler.send_prompt("The capital of France is", 5)?;

    assert_eq!(ranking.len(), 5);
    assert!(ranking.texts().contains(&"paris"));
    Ok(())
}

#[test]
#[ignore = "downloads EleutherAI/gpt-neo-125M"]
fn test_gpt_neo_greedy_generation() -> anyhow::Result<()> {
    let sampler =
        CausalLmSampler::from_pretrained("EleutherAI/gpt-neo-125M", &LoadConfig::default())?;

    let first = sampler.sample_several("Hello, my name is", 0.0, 8, &[StopToken::from("\n")])?;
    let second = sampler.sample_several("Hello, my name is", 0.0, 8, &[StopToken::from("\n")])?;
    assert_eq!(first, second);
    assert!(!first.contains('\n'));
    Ok(())
}

#[test]
#[ignore = "downloads the gpt2 tokenizer"]
fn test_gpt2_token_count() -> anyhow::Result<()> {
    let estimator = TokenCostEstimator::gpt2()?;
    assert_eq!(estimator.count_tokens("Hello world")?, 2);
    Ok(())
}
