use arrow_schema::DataType;
use feldspar::catalog::{
    ColumnDescriptor, DistributionPolicy, ForeignServer, IndexKind, MemoryCatalog,
    PartitionDescriptor, TableDescriptor, TableDescriptorBuilder, TableId,
};

fn table(id: u64, name: &str) -> TableDescriptorBuilder {
    TableDescriptor::builder(TableId(id), name)
        .column(ColumnDescriptor::new("id", DataType::Int64, -1, 1, false))
        .column(ColumnDescriptor::new("region", DataType::Utf8, -1, 2, true).with_width(16))
        .column(ColumnDescriptor::new("amount", DataType::Int32, -1, 3, true))
}

pub fn server(id: u32, coordinator_only: bool) -> ForeignServer {
    ForeignServer {
        id,
        name: format!("remote{}", id),
        coordinator_only,
    }
}

/// * `customers`, `orders`: hashed on `id`, with a bitmap index on `amount`.
/// * `regions`: replicated.
/// * `payroll`: like `customers` but with row level security.
/// * `events`: partitioned, one local partition and one on each of two foreign servers.
/// * `accounts`: hashed on `id`, with a btree index on `amount` storing every column.
pub fn warehouse_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    let tables = vec![
        table(1, "customers")
            .distributed_by(&["id"])
            .key(&["id"])
            .index(11, "customers_amount_idx", IndexKind::Bitmap, &["amount"])
            .unwrap()
            .rows(10000.0),
        table(2, "orders")
            .distributed_by(&["id"])
            .index(21, "orders_amount_idx", IndexKind::Bitmap, &["amount"])
            .unwrap()
            .rows(50000.0),
        table(3, "regions")
            .distribution(DistributionPolicy::Replicated)
            .rows(20.0),
        table(4, "payroll")
            .distributed_by(&["id"])
            .index(41, "payroll_amount_idx", IndexKind::Bitmap, &["amount"])
            .unwrap()
            .security_quals(true)
            .rows(10000.0),
        table(5, "events")
            .distributed_by(&["id"])
            .partitioned_by(&["region"])
            .partition(PartitionDescriptor::local(51))
            .partition(PartitionDescriptor::foreign(52, server(1, false)))
            .partition(PartitionDescriptor::foreign(53, server(2, true)))
            .rows(3000.0),
        table(6, "accounts")
            .distributed_by(&["id"])
            .index(61, "accounts_amount_idx", IndexKind::Btree, &["amount"])
            .and_then(|b| b.include(&["id", "region"]))
            .unwrap()
            .rows(20000.0),
    ];
    for table in tables {
        catalog.register_table(table.build().unwrap());
    }
    catalog
}
