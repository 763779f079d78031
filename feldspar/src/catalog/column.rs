use arrow_schema::DataType;

/// Width of a column whose width is unknown.
pub const UNKNOWN_WIDTH: u32 = u32::MAX;

/// Metadata of a column in the catalog.
#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    name: String,
    data_type: DataType,
    type_modifier: i32,
    /// Attribute number. System columns have negative numbers.
    attno: i32,
    nullable: bool,
    width: u32,
    is_dist_col: bool,
    is_part_col: bool,
}

impl ColumnDescriptor {
    pub fn new<S: Into<String>>(
        name: S,
        data_type: DataType,
        type_modifier: i32,
        attno: i32,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_modifier,
            attno,
            nullable,
            width: UNKNOWN_WIDTH,
            is_dist_col: false,
            is_part_col: false,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn type_modifier(&self) -> i32 {
        self.type_modifier
    }

    pub fn attno(&self) -> i32 {
        self.attno
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_system_column(&self) -> bool {
        self.attno < 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_dist_col(&self) -> bool {
        self.is_dist_col
    }

    pub fn is_part_col(&self) -> bool {
        self.is_part_col
    }

    pub fn set_as_dist_col(&mut self) {
        self.is_dist_col = true;
    }

    pub fn set_as_part_col(&mut self) {
        self.is_part_col = true;
    }
}

/// Partition membership is assigned after the columns are otherwise fixed, so it takes no part
/// in equality.
impl PartialEq for ColumnDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.type_modifier == other.type_modifier
            && self.attno == other.attno
            && self.nullable == other.nullable
            && self.is_system_column() == other.is_system_column()
            && self.width == other.width
            && self.is_dist_col == other.is_dist_col
    }
}

impl Eq for ColumnDescriptor {}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ColumnDescriptor {
        ColumnDescriptor::new("c1", DataType::Int32, -1, 1, true).with_width(4)
    }

    #[test]
    fn test_identical_descriptors_are_equal() {
        assert_eq!(descriptor(), descriptor());

        let mut left = descriptor();
        let mut right = descriptor();
        left.set_as_dist_col();
        right.set_as_dist_col();
        assert_eq!(left, right);
    }

    #[test]
    fn test_each_field_breaks_equality() {
        let base = descriptor();
        let changed = vec![
            ColumnDescriptor::new("c2", DataType::Int32, -1, 1, true).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int64, -1, 1, true).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int32, 10, 1, true).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int32, -1, 2, true).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int32, -1, 1, false).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int32, -1, -1, true).with_width(4),
            ColumnDescriptor::new("c1", DataType::Int32, -1, 1, true).with_width(8),
            ColumnDescriptor::new("c1", DataType::Int32, -1, 1, true),
            {
                let mut dist = descriptor();
                dist.set_as_dist_col();
                dist
            },
        ];

        for other in changed {
            assert_ne!(base, other, "{:?} should differ from {:?}", other, base);
        }
    }

    #[test]
    fn test_partition_flag_is_ignored() {
        let mut part = descriptor();
        part.set_as_part_col();

        assert!(part.is_part_col());
        assert_eq!(descriptor(), part);
    }

    #[test]
    fn test_system_column() {
        let ctid = ColumnDescriptor::new("ctid", DataType::Binary, -1, -1, false);
        assert!(ctid.is_system_column());
        assert!(!descriptor().is_system_column());
        assert_eq!(UNKNOWN_WIDTH, ctid.width());
    }
}
