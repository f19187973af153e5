use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{bail, Result};
use tch::Tensor;

/// A `Collator` defines how to combine multiple [`Sample`]s into a [`MiniBatch`].
pub trait Collator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch>;
}

/// A `Collator` that stacks images and masks with identical shapes along
/// the batch dimension (dim 0). No padding is applied: samples whose image
/// or mask shapes disagree produce an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl StackCollator {
    fn stack(tensors: &[&Tensor], feature: &str) -> Result<Tensor> {
        let reference_shape = tensors[0].size();
        for (i, tensor) in tensors.iter().enumerate() {
            if tensor.size() != reference_shape {
                bail!(
                    "Shape mismatch in sample {} for '{}': expected {:?}, got {:?}",
                    i,
                    feature,
                    reference_shape,
                    tensor.size()
                );
            }
        }
        Ok(Tensor::stack(tensors, 0))
    }
}

impl Collator for StackCollator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        let images: Vec<&Tensor> = samples.iter().map(|s| &s.image).collect();
        let masks: Vec<&Tensor> = samples.iter().map(|s| &s.mask).collect();

        Ok(MiniBatch {
            images: Self::stack(&images, "image")?,
            masks: Self::stack(&masks, "mask")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn make_sample(value: f64, size: i64) -> Sample {
        let image = Tensor::full([1, size, size], value, (Kind::Float, Device::Cpu));
        let mask = Tensor::zeros([2, size, size], (Kind::Float, Device::Cpu));
        Sample::new(image, mask).unwrap()
    }

    #[test]
    fn test_stack_collator_preserves_order() -> Result<()> {
        let samples = vec![make_sample(0.1, 4), make_sample(0.2, 4), make_sample(0.3, 4)];
        let batch = StackCollator.collate(&samples)?;

        assert_eq!(batch.images.size(), vec![3, 1, 4, 4]);
        assert_eq!(batch.masks.size(), vec![3, 2, 4, 4]);
        assert!((batch.images.double_value(&[2, 0, 0, 0]) - 0.3).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_stack_collator_rejects_shape_mismatch() {
        assert!(StackCollator.collate(&[]).is_err());

        let samples = vec![make_sample(0.0, 4), make_sample(0.0, 5)];
        let err = StackCollator.collate(&samples).unwrap_err();
        assert!(err.to_string().contains("Shape mismatch"));
    }
}
