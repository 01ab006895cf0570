// aperture_sim/src/simulation/config/serde_helpers.rs

//! Scenario files speak degrees; everything in memory is radians.

pub mod degrees {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(radians: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(radians.to_degrees())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let degrees = f64::deserialize(deserializer)?;
        Ok(degrees.to_radians())
    }
}

pub mod euler_deg {
    use aperture_core::kinematics::EulerAngles;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(angles: &EulerAngles, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // [roll, pitch, yaw] in degrees
        let arr = [
            angles.roll.to_degrees(),
            angles.pitch.to_degrees(),
            angles.yaw.to_degrees(),
        ];
        serializer.collect_seq(arr.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<EulerAngles, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr: [f64; 3] = Deserialize::deserialize(deserializer)?;
        Ok(EulerAngles::new(
            arr[0].to_radians(), // Roll
            arr[1].to_radians(), // Pitch
            arr[2].to_radians(), // Yaw
        ))
    }
}
