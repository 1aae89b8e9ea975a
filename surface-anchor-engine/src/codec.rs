//! Serde adapters for math types stored in persisted records.

/// `Mat4` as a column-major `[[f32; 4]; 4]`.
pub mod mat4 {
    use bevy::math::Mat4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Mat4, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_cols_array_2d().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Mat4, D::Error> {
        <[[f32; 4]; 4]>::deserialize(deserializer).map(|m| Mat4::from_cols_array_2d(&m))
    }
}

/// `Vec3` as `[f32; 3]`.
pub mod vec3 {
    use bevy::math::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_array().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        <[f32; 3]>::deserialize(deserializer).map(Vec3::from_array)
    }
}

/// `Vec<Vec3>` as a list of `[f32; 3]`.
pub mod vec3_seq {
    use bevy::math::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec3], serializer: S) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|point| point.to_array())
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec3>, D::Error> {
        Ok(Vec::<[f32; 3]>::deserialize(deserializer)?
            .into_iter()
            .map(Vec3::from_array)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::{Mat4, Vec3};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::mat4")]
        matrix: Mat4,
        #[serde(with = "super::vec3")]
        point: Vec3,
        #[serde(with = "super::vec3_seq")]
        cloud: Vec<Vec3>,
    }

    #[test]
    fn round_trips_through_json() {
        let sample = Sample {
            matrix: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            point: Vec3::new(-0.5, 0.25, 8.0),
            cloud: vec![Vec3::ZERO, Vec3::ONE],
        };
        let text = serde_json::to_string(&sample).unwrap();
        let back: Sample = serde_json::from_str(&text).unwrap();
        assert_eq!(back.matrix, sample.matrix);
        assert_eq!(back.point, sample.point);
        assert_eq!(back.cloud, sample.cloud);
    }
}
