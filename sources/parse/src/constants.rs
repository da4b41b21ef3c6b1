pub const MAGIC: u32 = 0xCAFEBABE;

pub mod attributes {
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const DEPRECATED: &str = "Deprecated";
    pub const SIGNATURE: &str = "Signature";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const CODE: &str = "Code";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
}
