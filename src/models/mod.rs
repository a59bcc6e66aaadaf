mod key_record;

pub use key_record::{
    DispensedKeyDto, GenerateKeysDto, KeyRecord, KeyRecordFilter, KeyRecordResponseDto,
    KeyStatsDto, KeyStatus, NewKeyRecord,
};
