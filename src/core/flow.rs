use crate::domain::model::{Package, ResourceDescriptor, ResourceRows, Row, TransformResult};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;

/// 逐列讀取的資料流
pub type RowIter = Box<dyn Iterator<Item = Result<Row>>>;

pub fn iter_rows(rows: Vec<Row>) -> RowIter {
    Box::new(rows.into_iter().map(Ok::<Row, EtlError>))
}

/// package 描述與每個資源的資料列，順序與 `package.resources` 一致
pub struct DataStream {
    pub package: Package,
    pub resources: Vec<RowIter>,
}

impl DataStream {
    pub fn empty() -> Self {
        Self {
            package: Package::default(),
            resources: Vec::new(),
        }
    }

    pub fn push_resource(&mut self, descriptor: ResourceDescriptor, rows: RowIter) -> Result<()> {
        if self.package.resource(&descriptor.name).is_some() {
            return Err(EtlError::ProcessingError {
                message: format!("Duplicate resource name '{}'", descriptor.name),
            });
        }
        self.package.resources.push(descriptor);
        self.resources.push(rows);
        Ok(())
    }

    /// 讀完所有資料列，遇到第一個錯誤即停止
    pub fn collect(self) -> Result<TransformResult> {
        let mut resources = Vec::with_capacity(self.resources.len());
        for (descriptor, rows) in self.package.resources.iter().zip(self.resources) {
            let rows = rows.collect::<Result<Vec<Row>>>()?;
            tracing::debug!("📥 {}: {} rows", descriptor.name, rows.len());
            resources.push(ResourceRows {
                name: descriptor.name.clone(),
                rows,
            });
        }

        Ok(TransformResult {
            package: self.package,
            resources,
        })
    }
}

/// Flow 中的一個步驟：schema 變更立即完成，資料列則延遲處理
pub trait Processor {
    fn name(&self) -> &str;

    fn process(self: Box<Self>, stream: DataStream) -> Result<DataStream>;
}

#[derive(Debug, Clone)]
pub struct FlowStats {
    pub package: Package,
    pub row_counts: HashMap<String, usize>,
}

#[derive(Default)]
pub struct Flow {
    steps: Vec<Box<dyn Processor>>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<P: Processor + 'static>(mut self, step: P) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Processor>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 依序套用所有步驟，尚未讀取任何資料列
    pub fn datastream(self) -> Result<DataStream> {
        let mut stream = DataStream::empty();
        for step in self.steps {
            let name = step.name().to_string();
            tracing::debug!("🔧 Applying step: {}", name);
            stream = step.process(stream).map_err(|e| match e {
                EtlError::FieldNotFound { .. } | EtlError::ValidationError { .. } => e,
                other => EtlError::TransformationError {
                    stage: name.clone(),
                    details: other.to_string(),
                },
            })?;
        }
        Ok(stream)
    }

    pub fn results(self) -> Result<TransformResult> {
        self.datastream()?.collect()
    }

    /// 讀完所有資料列但不保留，只回傳最終 package 與列數
    pub fn process(self) -> Result<FlowStats> {
        let stream = self.datastream()?;
        let mut row_counts = HashMap::new();
        for (descriptor, rows) in stream.package.resources.iter().zip(stream.resources) {
            let mut count = 0;
            for row in rows {
                row?;
                count += 1;
            }
            row_counts.insert(descriptor.name.clone(), count);
        }

        Ok(FlowStats {
            package: stream.package,
            row_counts,
        })
    }
}
