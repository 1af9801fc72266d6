use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One job as delivered by the serverless platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Diffusion sampler requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheduler {
    #[serde(rename = "DDIM")]
    Ddim,
    #[serde(rename = "K_EULER")]
    KEuler,
    #[default]
    #[serde(rename = "DPMSolverMultistep")]
    DpmSolverMultistep,
    #[serde(rename = "K_EULER_ANCESTRAL")]
    KEulerAncestral,
    #[serde(rename = "PNDM")]
    Pndm,
    #[serde(rename = "KLMS")]
    Klms,
}

impl Scheduler {
    pub const ALL: [Scheduler; 6] = [
        Scheduler::Ddim,
        Scheduler::KEuler,
        Scheduler::DpmSolverMultistep,
        Scheduler::KEulerAncestral,
        Scheduler::Pndm,
        Scheduler::Klms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::Ddim => "DDIM",
            Scheduler::KEuler => "K_EULER",
            Scheduler::DpmSolverMultistep => "DPMSolverMultistep",
            Scheduler::KEulerAncestral => "K_EULER_ANCESTRAL",
            Scheduler::Pndm => "PNDM",
            Scheduler::Klms => "KLMS",
        }
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheduler {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scheduler::ALL
            .iter()
            .copied()
            .find(|scheduler| scheduler.as_str() == s)
            .ok_or(())
    }
}

/// Job input after defaulting and range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedInput {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub num_outputs: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub scheduler: Scheduler,
    pub seed: i64,
}

/// Parameters handed to the predictor. Same shape as the validated input.
pub type PredictRequest = ValidatedInput;

/// One generated image as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub image: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub scheduler: Scheduler,
    pub seed: i64,
}

impl OutputRecord {
    pub fn new(input: &ValidatedInput, image: String, index: usize) -> Self {
        Self {
            image,
            prompt: input.prompt.clone(),
            negative_prompt: input.negative_prompt.clone(),
            width: input.width,
            height: input.height,
            num_inference_steps: input.num_inference_steps,
            guidance_scale: input.guidance_scale,
            scheduler: input.scheduler,
            seed: input.seed.wrapping_add(index as i64),
        }
    }
}

/// Everything the handler can answer with. Serialised without a tag so the
/// caller sees the bare array or one of the object shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerResponse {
    Health { status: String, model_loaded: bool },
    Errors { errors: Vec<String> },
    Error { error: String },
    Outputs(Vec<OutputRecord>),
}

impl HandlerResponse {
    pub fn healthy(model_loaded: bool) -> Self {
        HandlerResponse::Health {
            status: "healthy".to_string(),
            model_loaded,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HandlerResponse::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scheduler_wire_names() {
        for scheduler in Scheduler::ALL {
            let encoded = serde_json::to_value(scheduler).unwrap();
            assert_eq!(encoded, json!(scheduler.as_str()));
            assert_eq!(scheduler.as_str().parse::<Scheduler>(), Ok(scheduler));
        }
        assert!("k_euler".parse::<Scheduler>().is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_value(HandlerResponse::healthy(true)).unwrap(),
            json!({"status": "healthy", "model_loaded": true})
        );
        assert_eq!(
            serde_json::to_value(HandlerResponse::Error {
                error: "boom".to_string()
            })
            .unwrap(),
            json!({"error": "boom"})
        );
        assert_eq!(
            serde_json::to_value(HandlerResponse::Outputs(vec![])).unwrap(),
            json!([])
        );
    }

    #[test]
    fn test_output_record_offsets_seed() {
        let input = ValidatedInput {
            prompt: "a lighthouse".to_string(),
            negative_prompt: None,
            width: 512,
            height: 768,
            num_outputs: 2,
            num_inference_steps: 30,
            guidance_scale: 7.5,
            scheduler: Scheduler::KEuler,
            seed: 41,
        };
        let record = OutputRecord::new(&input, "https://cdn/x.png".to_string(), 1);
        assert_eq!(record.seed, 42);
        assert_eq!(record.width, 512);
        assert_eq!(record.scheduler, Scheduler::KEuler);
    }
}
