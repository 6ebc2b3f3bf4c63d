use anyhow::Result;
use ndarray::Array1;
use opencv::core::{self, Mat, MatTraitConst, Vector};
use opencv::imgproc;

use crate::features::FeatureExtractor;

/// HSV 每个通道的取值范围，H 为 0..180，S/V 为 0..256
const CHANNEL_RANGES: [(f32, f32); 3] = [(0.0, 180.0), (0.0, 256.0), (0.0, 256.0)];

/// HSV 直方图特征：3 个通道各 bins 个 bin，
/// 每个通道独立做 min-max 归一化到 [0, 1] 后拼接
pub struct HistogramExtractor {
    bins: i32,
}

impl HistogramExtractor {
    pub fn new(bins: i32) -> Self {
        Self { bins }
    }
}

impl FeatureExtractor for HistogramExtractor {
    fn dim(&self) -> usize {
        self.bins as usize * 3
    }

    fn extract(&mut self, image: &Mat) -> Result<Array1<f32>> {
        let mut hsv = Mat::default();
        imgproc::cvt_color_def(image, &mut hsv, imgproc::COLOR_BGR2HSV)?;
        let images = Vector::<Mat>::from_iter([hsv]);

        let mut feature = Vec::with_capacity(self.dim());
        for (channel, (lo, hi)) in CHANNEL_RANGES.iter().enumerate() {
            let channels = Vector::<i32>::from_iter([channel as i32]);
            let hist_size = Vector::<i32>::from_iter([self.bins]);
            let ranges = Vector::<f32>::from_iter([*lo, *hi]);

            let mut hist = Mat::default();
            imgproc::calc_hist(
                &images,
                &channels,
                &core::no_array(),
                &mut hist,
                &hist_size,
                &ranges,
                false,
            )?;

            let mut norm = Mat::default();
            core::normalize(&hist, &mut norm, 0.0, 1.0, core::NORM_MINMAX, -1, &core::no_array())?;
            for i in 0..self.bins {
                feature.push(*norm.at::<f32>(i)?);
            }
        }
        Ok(Array1::from_vec(feature))
    }
}

#[cfg(test)]
mod tests {
    use opencv::core::{CV_8UC3, Scalar};

    use super::*;
    use crate::similarity::{Match, correlation, rank_matches};

    fn solid(b: f64, g: f64, r: f64) -> Mat {
        Mat::new_rows_cols_with_default(64, 64, CV_8UC3, Scalar::new(b, g, r, 0.0)).unwrap()
    }

    #[test]
    fn histogram_has_48_dims_in_unit_range() -> Result<()> {
        let mut extractor = HistogramExtractor::new(16);
        let feature = extractor.extract(&solid(12.0, 200.0, 56.0))?;
        assert_eq!(feature.len(), 48);
        assert_eq!(feature.len(), extractor.dim());
        assert!(feature.iter().all(|&v| (0.0..=1.0).contains(&v)));
        Ok(())
    }

    #[test]
    fn identical_colors_correlate_to_one() -> Result<()> {
        let mut extractor = HistogramExtractor::new(16);
        let a = extractor.extract(&solid(0.0, 0.0, 255.0))?;
        let b = extractor.extract(&solid(0.0, 0.0, 250.0))?;
        assert!((correlation(&a, &b) - 1.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn red_target_ranks_red_gallery_first() -> Result<()> {
        let mut extractor = HistogramExtractor::new(16);
        let query = extractor.extract(&solid(0.0, 0.0, 255.0))?;
        let red = extractor.extract(&solid(0.0, 0.0, 255.0))?;
        let blue = extractor.extract(&solid(255.0, 0.0, 0.0))?;

        let sim_red = correlation(&query, &red);
        let sim_blue = correlation(&query, &blue);
        assert!((sim_red - 1.0).abs() < 1e-4);
        assert!(sim_blue < 0.5);

        let ranked = rank_matches(
            vec![
                Match::new("img_blue.png".into(), sim_blue, Some(sim_blue >= 0.7)),
                Match::new("img_red.png".into(), sim_red, Some(sim_red >= 0.7)),
            ],
            5,
        );
        assert_eq!(ranked[0].name, "img_red.png");
        assert_eq!(ranked[0].is_match, Some(true));
        Ok(())
    }
}
