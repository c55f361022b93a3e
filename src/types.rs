pub type Tick = u32;
pub type FieldId = u8;
