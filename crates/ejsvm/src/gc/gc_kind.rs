/// Concrete record kind, selects the body variant a type's instances carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VarKind {
    Object = 0,
    String = 1,
    Number = 2,
    Boolean = 3,
    Native = 4,
}

impl VarKind {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            VarKind::Object => "object",
            VarKind::String => "string",
            VarKind::Number => "number",
            VarKind::Boolean => "boolean",
            VarKind::Native => "native",
        }
    }
}
