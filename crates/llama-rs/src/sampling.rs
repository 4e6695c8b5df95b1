//! Sampler chain owned by a session. Stage order is load-bearing: the
//! distribution stage consumes whatever logit shape the temperature stage
//! left behind.

use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_sampler, llama_sampler_chain_add, llama_sampler_chain_default_params,
    llama_sampler_chain_init, llama_sampler_free, llama_sampler_init_dist,
    llama_sampler_init_temp, llama_sampler_sample,
};

use crate::context::LlamaContext;
use crate::token::LlamaToken;

/// Owned `llama_sampler` chain: temperature, then seeded distribution
/// sampling.
pub struct SamplerChain {
    chain: NonNull<llama_sampler>,
}

impl SamplerChain {
    pub fn new(temperature: f32, seed: u32) -> Result<Self, String> {
        let params = unsafe { llama_sampler_chain_default_params() };
        let chain = NonNull::new(unsafe { llama_sampler_chain_init(params) })
            .ok_or_else(|| "llama_sampler_chain_init returned null".to_string())?;
        unsafe {
            llama_sampler_chain_add(chain.as_ptr(), llama_sampler_init_temp(temperature));
            llama_sampler_chain_add(chain.as_ptr(), llama_sampler_init_dist(seed));
        }
        Ok(Self { chain })
    }

    /// Sample one token from the logits at batch index `idx` (-1 = the
    /// most recent logits).
    pub fn sample(&mut self, ctx: &LlamaContext, idx: i32) -> LlamaToken {
        LlamaToken(unsafe { llama_sampler_sample(self.chain.as_ptr(), ctx.as_ptr(), idx) })
    }
}

impl Drop for SamplerChain {
    fn drop(&mut self) {
        unsafe { llama_sampler_free(self.chain.as_ptr()) };
    }
}
