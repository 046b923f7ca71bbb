use fibre_context::{Bean, BoxError, Container, Definition};

struct ConnectionPool {
  size: usize,
}

impl ConnectionPool {
  fn open(&self) -> Result<(), BoxError> {
    println!("Opening {} connections.", self.size);
    Ok(())
  }

  fn close(&self) -> Result<(), BoxError> {
    println!("Closing {} connections.", self.size);
    Ok(())
  }
}

fn main() -> fibre_context::Result<()> {
  let container = Container::new();

  // Every instance the container creates from now on passes through here.
  container.add_post_processor(|bean: &Bean<'_>, _: &Container| -> Result<(), BoxError> {
    println!("Created bean '{}'.", bean.name().unwrap_or(bean.type_name()));
    Ok(())
  });

  container.register(
    Definition::of::<ConnectionPool>()
      .name("pool")
      .factory(|_| Ok(ConnectionPool { size: 4 }))
      .post_construct("open", ConnectionPool::open)
      .pre_destroy("close", ConnectionPool::close)
      .build()?,
  )?;

  // Creates every non-lazy singleton.
  container.refresh()?;
  let pool = container.get::<ConnectionPool>()?;
  println!("Pool has {} connections.", pool.size);

  let report = container.destroy_singletons();
  println!(
    "Shutdown ran {} hooks with {} failures.",
    report.invoked,
    report.failures.len()
  );
  Ok(())
}
