use crate::ids::Key;

pub mod entity_class {
    use super::Key;

    pub const ENTITY: Key = Key::from_u128(0xe29fcfad_ec1d_4c60_a055_039a494248ae);
    pub const PERSON: Key = Key::from_u128(0x9de2a846_ddf2_4ebc_902e_84508c5089ea);
    pub const PATIENT: Key = Key::from_u128(0xbacd9c6f_3fa9_481e_9636_37457962804d);
    pub const PROVIDER: Key = Key::from_u128(0x6b04fed8_c164_469c_910b_f824c2bda4f0);
    pub const USER_ENTITY: Key = Key::from_u128(0x8ba5e5c9_693b_49d4_973c_d7010f3a23ee);
    pub const PLACE: Key = Key::from_u128(0x21ab7873_8ef3_4d78_9c19_4582b3c40631);
    pub const ORGANIZATION: Key = Key::from_u128(0x7c08bd55_4d42_49cd_92f8_6388d6c4183f);
    pub const MATERIAL: Key = Key::from_u128(0xd39073be_0f8f_440e_b8c8_3034cc138a49);
    pub const MANUFACTURED_MATERIAL: Key = Key::from_u128(0xfafec286_89d5_420b_9085_054aca9d1eef);
    pub const DEVICE: Key = Key::from_u128(0x1373ff04_a6ef_420a_b1d0_4a07465fe8e8);
    pub const APPLICATION: Key = Key::from_u128(0xe9e4f3ac_4b06_4c44_9f9c_3d6bd7b4c2e1);
}

pub mod act_class {
    use super::Key;

    pub const ACT: Key = Key::from_u128(0xd874424e_c692_4fd8_b94e_642e1cbf83e9);
    pub const OBSERVATION: Key = Key::from_u128(0x28d022c6_8a8b_47c4_9e6a_2bc67308739e);
    pub const SUBSTANCE_ADMINISTRATION: Key = Key::from_u128(0x932a3c7e_ad77_450a_8a1f_030fc2855450);
    pub const ENCOUNTER: Key = Key::from_u128(0x54b52119_1709_4098_8911_5df6d6c84140);
    pub const CONTROL_ACT: Key = Key::from_u128(0xb35488ce_b7cd_4dd4_b4de_5f83dc55af9f);
}

pub mod status {
    use super::Key;

    pub const NEW: Key = Key::from_u128(0xc34fcbf1_e0fe_4989_90fd_0dc49e1b9685);
    pub const ACTIVE: Key = Key::from_u128(0xc8064cbd_fa06_4530_b430_1a52f1530c27);
    pub const COMPLETED: Key = Key::from_u128(0xafc33800_8225_4061_b168_bacc09cdbae3);
    pub const OBSOLETE: Key = Key::from_u128(0xbdef5f90_5497_4f26_956c_8f818cce2bd2);
}

pub mod determiner {
    use super::Key;

    pub const SPECIFIC: Key = Key::from_u128(0xf29f08de_78a7_4a5e_aeaf_7b545ba19a09);
}

pub mod mood {
    use super::Key;

    pub const EVENT_OCCURRENCE: Key = Key::from_u128(0xec74541f_87c4_4327_a4b9_97f325501747);
    pub const INTENT: Key = Key::from_u128(0x099bcc5e_8e2f_4d50_b509_9f9d5bbeb58e);
}

pub mod relationship {
    use super::Key;

    pub const MOTHER: Key = Key::from_u128(0x29ff64e5_b564_411a_92c7_6818c02a9e48);
    pub const FATHER: Key = Key::from_u128(0x40d18ecc_8ff8_4e03_8e58_97a980f04060);
    pub const DEDICATED_SERVICE_DELIVERY_LOCATION: Key =
        Key::from_u128(0x455f1772_f580_47e8_86bd_b5ce25d351f9);
    pub const HAS_COMPONENT: Key = Key::from_u128(0x78b9540f_438b_4b6f_8d83_aaf4979dbc64);
}

pub mod participation {
    use super::Key;

    pub const RECORD_TARGET: Key = Key::from_u128(0x3f92dbee_a65e_434f_98ce_841feeb02e3f);
    pub const PERFORMER: Key = Key::from_u128(0xfa5e70a4_a46e_4665_8a20_94d4d7b86fc8);
    pub const LOCATION: Key = Key::from_u128(0x61848557_d78d_40e5_954f_0b9c97307a04);
}

pub mod security {
    use super::Key;

    /// The principal that owns writes made without an authenticated user.
    pub const SYSTEM_USER: Key = Key::from_u128(0xfadca076_3690_4a6e_af9e_f1cd68e8c7e8);
}
