use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Surface point `(x, y)`: horizontal object distance and height above the
/// optical axis, one per stripe row.
pub type SurfacePoint = Point2<f64>;

/// Stripe pixel found in one image row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StripeObservation {
    pub row: usize,
    pub column: usize,
}

/// Points contributed by one tick, with the actuator position they were
/// captured at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSlice {
    pub tick: u64,
    pub pulse_width: i32,
    /// Index of the first point of this slice in [`PointCloud::points`].
    pub start: usize,
    pub len: usize,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("slice for tick {got} appended after tick {last}")]
    TickOrder { last: u64, got: u64 },
}

/// Append-only point set in strict tick order, row order within a tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    points: Vec<SurfacePoint>,
    slices: Vec<ProfileSlice>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the points of one tick. Returns the number of points added.
    ///
    /// Ticks must be strictly increasing; an empty slice is still recorded so
    /// that the sweep position of every tick stays recoverable.
    pub fn push_slice<I>(
        &mut self,
        tick: u64,
        pulse_width: i32,
        points: I,
    ) -> Result<usize, CloudError>
    where
        I: IntoIterator<Item = SurfacePoint>,
    {
        if let Some(last) = self.slices.last() {
            if tick <= last.tick {
                return Err(CloudError::TickOrder {
                    last: last.tick,
                    got: tick,
                });
            }
        }
        let start = self.points.len();
        self.points.extend(points);
        let len = self.points.len() - start;
        self.slices.push(ProfileSlice {
            tick,
            pulse_width,
            start,
            len,
        });
        Ok(len)
    }

    #[inline]
    pub fn points(&self) -> &[SurfacePoint] {
        &self.points
    }

    #[inline]
    pub fn slices(&self) -> &[ProfileSlice] {
        &self.slices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points belonging to `slice`.
    pub fn slice_points(&self, slice: &ProfileSlice) -> &[SurfacePoint] {
        let end = (slice.start + slice.len).min(self.points.len());
        &self.points[slice.start.min(end)..end]
    }

    /// Slices together with their points, in tick order.
    pub fn profiles(&self) -> impl Iterator<Item = (&ProfileSlice, &[SurfacePoint])> + '_ {
        self.slices.iter().map(move |s| (s, self.slice_points(s)))
    }

    /// Summary statistics, `None` for an empty cloud.
    pub fn stats(&self) -> Option<CloudStats> {
        CloudStats::from_points(&self.points)
    }
}

/// Mean and population variance of a point set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudStats {
    pub count: usize,
    pub mean_x: f64,
    pub mean_y: f64,
    pub var_x: f64,
    pub var_y: f64,
}

impl CloudStats {
    pub fn from_points(points: &[SurfacePoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let mean = points
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords)
            / n;
        let var = points.iter().fold(Vector2::zeros(), |acc: Vector2<f64>, p| {
            let d = p.coords - mean;
            acc + d.component_mul(&d)
        }) / n;
        Some(Self {
            count: points.len(),
            mean_x: mean.x,
            mean_y: mean.y,
            var_x: var.x,
            var_y: var.y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn slices_keep_tick_and_row_order() {
        let mut cloud = PointCloud::new();
        let added = cloud
            .push_slice(0, 1863, [SurfacePoint::new(1.0, 2.0), SurfacePoint::new(1.0, 1.0)])
            .expect("first");
        assert_eq!(added, 2);
        cloud.push_slice(1, 1883, std::iter::empty()).expect("empty slice");
        cloud
            .push_slice(2, 1903, [SurfacePoint::new(3.0, 0.5)])
            .expect("third");

        assert_eq!(cloud.len(), 3);
        let ticks: Vec<u64> = cloud.slices().iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![0, 1, 2]);

        let profiles: Vec<(i32, usize)> = cloud
            .profiles()
            .map(|(slice, points)| (slice.pulse_width, points.len()))
            .collect();
        assert_eq!(profiles, vec![(1863, 2), (1883, 0), (1903, 1)]);
        assert_eq!(cloud.slice_points(&cloud.slices()[2])[0].x, 3.0);
    }

    #[test]
    fn out_of_order_tick_is_rejected() {
        let mut cloud = PointCloud::new();
        cloud.push_slice(5, 1863, std::iter::empty()).expect("first");
        let err = cloud
            .push_slice(5, 1863, [SurfacePoint::new(0.0, 0.0)])
            .unwrap_err();
        assert_eq!(err, CloudError::TickOrder { last: 5, got: 5 });
        assert!(cloud.is_empty());
    }

    #[test]
    fn stats_report_mean_and_variance() {
        let points = [
            SurfacePoint::new(1.0, 0.0),
            SurfacePoint::new(3.0, 0.0),
            SurfacePoint::new(2.0, 3.0),
        ];
        let stats = CloudStats::from_points(&points).expect("non-empty");
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean_x, 2.0);
        assert_relative_eq!(stats.mean_y, 1.0);
        assert_relative_eq!(stats.var_x, 2.0 / 3.0);
        assert_relative_eq!(stats.var_y, 2.0);
        assert!(CloudStats::from_points(&[]).is_none());
    }
}
